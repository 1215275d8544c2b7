use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Food description to analyze, e.g. "50g de poulet et une banane"
    pub message: Option<String>,

    /// Analyze a food photo instead of text
    #[arg(short, long)]
    pub image: Option<String>,

    /// CSV file overriding the built-in nutrition table
    #[arg(long)]
    pub table_csv: Option<String>,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
