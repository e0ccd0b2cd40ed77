use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about = "Helpdesk command line client")]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/helpdesk"
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store an encrypted session
    Login {
        #[arg(long, env = "HELPDESK_EMAIL")]
        email: String,
        #[arg(long, env = "HELPDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the stored session
    Logout,

    /// Show who the stored session belongs to
    Whoami,

    /// Change your own password
    Passwd {
        #[arg(long)]
        current: String,
        #[arg(long = "new")]
        new_password: String,
    },

    /// Clear a locked account (admin)
    Unlock {
        #[arg(long)]
        email: String,
    },

    /// Set another user's password (admin)
    AdminReset {
        #[arg(long)]
        email: String,
        #[arg(long = "new")]
        new_password: String,
    },

    /// Rank technicians for a set of skills (admin)
    Match {
        /// Required skill; repeat for several.
        #[arg(long = "skill", required = true)]
        skills: Vec<String>,
    },

    /// Delete an account by id (admin)
    DeleteUser {
        #[arg(long)]
        id: i64,
    },

    /// Show recent audit entries, newest first (admin)
    Logs {
        /// Only entries whose event, detail or source contains this text.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Delete all tickets and every account except your own (admin)
    ClearDatabase {
        /// Required; the wipe cannot be undone.
        #[arg(long)]
        yes: bool,
    },

    /// Print version
    Version,
}
