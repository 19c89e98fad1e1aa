use clap::Parser;

/// Runtime configuration, from flags or `FSD_*` environment variables.
#[derive(Parser, Clone, Debug)]
#[command(name = "fsd-server", about = "FSD flight-simulation network server")]
pub struct ServerConfig {
    /// Client listener addresses (host:port, comma separated)
    #[arg(long, env = "FSD_LISTEN", default_value = "0.0.0.0:6809", value_delimiter = ',')]
    pub listen: Vec<String>,

    /// Admin HTTP listener address
    #[arg(long, env = "FSD_ADMIN_LISTEN", default_value = "127.0.0.1:13618")]
    pub admin_listen: String,

    /// Name reported in the server greeting
    #[arg(long, env = "FSD_SERVER_NAME", default_value = "openskies")]
    pub server_name: String,

    /// Message of the day, one `#TM` line per newline
    #[arg(long, env = "FSD_MOTD")]
    pub motd: Option<String>,

    /// Read the message of the day from a file instead
    #[arg(long, env = "FSD_MOTD_FILE")]
    pub motd_file: Option<String>,

    /// HS256 secret for service token logins and the admin channel
    #[arg(long, env = "FSD_JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JSON user directory for password logins
    #[arg(long, env = "FSD_USERS_FILE")]
    pub users_file: Option<String>,

    /// Weather fetch worker count
    #[arg(long, env = "FSD_METAR_WORKERS", default_value_t = 4)]
    pub metar_workers: usize,

    /// Flush every outbound packet immediately instead of coalescing
    #[arg(long, env = "FSD_ALWAYS_IMMEDIATE")]
    pub always_immediate: bool,

    /// Emit JSON logs
    #[arg(long, env = "FSD_LOG_JSON")]
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["fsd-server"])
    }
}
