use super::*;

#[derive(Clone, Default, Debug, Parser)]
pub(crate) struct Options {
    #[arg(long, help = "Load configuration from <CONFIG>.")]
    pub(crate) config: Option<PathBuf>,

    #[arg(long, help = "Listen for miners on <ADDRESS>. [default: 0.0.0.0]")]
    pub(crate) address: Option<String>,

    #[arg(long, help = "Listen for miners on <PORT>. [default: 3333]")]
    pub(crate) port: Option<u16>,

    #[arg(long, help = "Serve the stats API on <STATS_PORT>. [default: 8080]")]
    pub(crate) stats_port: Option<u16>,

    #[arg(long, help = "Start miners at <INITIAL_DIFF>. [default: 1]")]
    pub(crate) initial_diff: Option<f64>,
}
