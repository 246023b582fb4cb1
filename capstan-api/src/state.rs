use capstan_core::Queue;

#[derive(Clone)]
pub struct AppState {
    pub queue: Queue,
    pub api_token: String,
    pub environment: String,
}
