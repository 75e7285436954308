use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Register sources from a JSON manifest (one descriptor or an array)
    Register {
        manifest: String,
    },

    /// Remove a source from the catalog
    Deregister {
        urn: String,
    },

    /// List registered sources
    List {
        #[arg(long)]
        geography: Option<String>,

        #[arg(long)]
        owner_group: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Discover, authorize and query sources for an intent
    Query {
        intent: String,

        /// Subject attribute as key=value (repeatable)
        #[arg(short, long = "subject", value_name = "KEY=VALUE")]
        subject: Vec<String>,

        /// Subject attributes as a JSON object, merged under --subject pairs
        #[arg(long)]
        subject_json: Option<String>,

        #[arg(long)]
        geography: Option<String>,

        /// Allowed sensitivity class (repeatable)
        #[arg(long)]
        sensitivity: Vec<String>,

        /// Excluded sensitivity class (repeatable)
        #[arg(long)]
        exclude_sensitivity: Vec<String>,

        #[arg(long)]
        owner_group: Option<String>,

        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Per-source timeout in milliseconds
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,

        /// Whole-query deadline in milliseconds
        #[arg(long)]
        overall_timeout_ms: Option<u64>,

        /// Print the stamped response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP gateway
    Serve {
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Bind to 0.0.0.0 instead of 127.0.0.1, exposing the server on all network interfaces
        #[arg(long)]
        public: bool,
    },
}
