use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "stack-mcp-agent",
    version,
    about = "Chat with a Llama Stack agent backed by MCP tools"
)]
pub struct Cli {
    /// Use the remote base URL and MCP endpoint from the environment
    #[arg(short, long)]
    pub remote: bool,
    /// Print agent session info on exit
    #[arg(short, long)]
    pub session_info_on_exit: bool,
    /// Run the configured prompts and skip the chat session
    #[arg(short, long)]
    pub auto: bool,
    /// Alternate agent settings file
    #[arg(long)]
    pub config: Option<String>,
}
