use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mpd-gateway-cli")]
#[command(about = "Command-line client for the MPD gateway API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5500")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show player status and the current song
    Status,
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Stop playback
    Stop,
    /// Skip to the next track
    Next,
    /// Go back to the previous track
    Previous,
    /// Seek to a position in seconds
    Seek {
        position: String,
        /// Song id to seek in, instead of the current song
        #[arg(long)]
        id: Option<String>,
    },
    /// Set the volume (0-100)
    Volume { volume: String },
    /// Show the current playlist
    Playlist,
    /// Append a track to the playlist
    Add {
        uri: String,
        /// Start playing the track once added
        #[arg(long)]
        play: bool,
    },
    /// Remove the track at a playlist position
    Remove { position: String },
    /// Play the track at a playlist position
    Jump { position: String },
    /// Clear the playlist
    Clear,
    /// Search the library
    Search { query: String },
    /// List stored playlists
    Playlists,
    /// Toggle shuffle
    Random,
    /// Toggle repeat
    Repeat,
    /// Check backend health
    Health,
}

enum Call {
    Get(&'static str, Vec<(&'static str, String)>),
    Post(&'static str, Vec<(&'static str, String)>),
}

impl Commands {
    fn call(self) -> Call {
        use Call::{Get, Post};

        match self {
            Commands::Status => Get("/api/status", vec![]),
            Commands::Play => Post("/api/play", vec![]),
            Commands::Pause => Post("/api/pause", vec![]),
            Commands::Stop => Post("/api/stop", vec![]),
            Commands::Next => Post("/api/next", vec![]),
            Commands::Previous => Post("/api/previous", vec![]),
            Commands::Seek { position, id } => {
                let mut form = vec![("position", position)];
                if let Some(id) = id {
                    form.push(("id", id));
                }
                Post("/api/seek", form)
            }
            Commands::Volume { volume } => Post("/api/volume", vec![("volume", volume)]),
            Commands::Playlist => Get("/api/playlist", vec![]),
            Commands::Add { uri, play: false } => Post("/api/playlist/add", vec![("uri", uri)]),
            Commands::Add { uri, play: true } => {
                Post("/api/playlist/addplay", vec![("uri", uri)])
            }
            Commands::Remove { position } => {
                Post("/api/playlist/remove", vec![("position", position)])
            }
            Commands::Jump { position } => Post("/api/playlist/play", vec![("position", position)]),
            Commands::Clear => Post("/api/playlist/clear", vec![]),
            Commands::Search { query } => Get("/api/search", vec![("query", query)]),
            Commands::Playlists => Get("/api/playlists", vec![]),
            Commands::Random => Post("/api/random", vec![]),
            Commands::Repeat => Post("/api/repeat", vec![]),
            Commands::Health => Get("/api/health", vec![]),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command.call() {
        Call::Get(path, query) => {
            client
                .get(format!("{base}{path}"))
                .query(&query)
                .send()
                .await?
        }
        Call::Post(path, form) => {
            client
                .post(format!("{base}{path}"))
                .form(&form)
                .send()
                .await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let body = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{body}");
    } else {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("{body}");
        std::process::exit(1);
    }
    Ok(())
}
