use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3400")]
    pub port: u16,

    #[envconfig(from = "DATABASE_URL", default = "sqlite://capstan.db")]
    pub database_url: String,

    // No default: the service must not come up without a shared token.
    #[envconfig(from = "INTERNAL_API_TOKEN")]
    pub internal_api_token: String,

    #[envconfig(from = "ENVIRONMENT", default = "dev")]
    pub environment: String,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
