use clap::{Parser, Subcommand};
use lyricat_engine::core::{Board, ChartRecord};
use lyricat_engine::providers::LeaderboardClient;
use lyricat_engine::{
    BestEntry, Catalog, ChartKind, EngineConfig, EngineError, RatingEngine, SessionToken, SongId,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lyricat")]
#[command(about = "Lyrica rating engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Song sheet
    #[arg(long, default_value = "song_lib.yml")]
    catalog: String,

    /// Session token of the player
    #[arg(short, long, env = "LYRICAT_SESSION_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Best 35 songs released before the latest major version
    B35,

    /// Best 15 songs of the latest major version
    B15,

    /// b35 and b15 together
    B50,

    /// Overall rating
    Mr {
        /// Only print the rating, not the lists
        #[arg(long)]
        hide: bool,
    },

    /// Your records on every chart of a song
    Score {
        song_id: SongId,

        /// Use this month's leaderboard
        #[arg(short, long)]
        month: bool,
    },

    /// Public leaderboard of a chart
    Leaderboard {
        song_id: SongId,

        /// 1 Easy, 2 Normal, 3 Hard, 4 Master, 5 Special
        chart_id: u8,

        /// Use this month's leaderboard
        #[arg(short, long)]
        month: bool,
    },

    /// When the session token expires
    Expiry,

    /// Account behind the session token
    Me,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lyricat=info,lyricat_engine=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match run(cli).await {
        Err(EngineError::BadUpstreamResponse(detail)) => {
            tracing::debug!("bad upstream response: {}", detail);
            eprintln!("❌ Bad upstream response. Try a new session token?");
            std::process::exit(1);
        }
        result => Ok(result?),
    }
}

async fn run(cli: Cli) -> lyricat_engine::Result<()> {
    let config = EngineConfig::load(&cli.config).await?;
    let catalog = Arc::new(Catalog::from_path(&cli.catalog).await?);
    let client = Arc::new(LeaderboardClient::new(&config)?);
    let token = SessionToken::new(cli.token);
    let engine = RatingEngine::from_config(catalog.clone(), client.clone(), &config);

    match cli.command {
        Commands::B35 => {
            print_best(&catalog, &engine.best_old(&token).await?);
        }

        Commands::B15 => {
            print_best(&catalog, &engine.best_new(&token).await?);
        }

        Commands::B50 => {
            let rating = engine.player_rating(&token).await?;
            let lists: Vec<&[BestEntry]> = [rating.best_old.as_slice(), rating.best_new.as_slice()]
                .into_iter()
                .filter(|list| !list.is_empty())
                .collect();
            if lists.is_empty() {
                print_best(&catalog, &[]);
            }
            for (i, list) in lists.into_iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_best(&catalog, list);
            }
        }

        Commands::Mr { hide } => {
            let rating = engine.player_rating(&token).await?;
            println!("⭐ MR\t{}", rating.rating);
            if !hide {
                println!("\n📋 b35\t({})", rating.old_contribution);
                print_best(&catalog, &rating.best_old);
                println!("\n📋 b15\t({})", rating.new_contribution);
                print_best(&catalog, &rating.best_new);
            }
        }

        Commands::Score { song_id, month } => {
            let song = catalog.song(song_id).ok_or(EngineError::UnknownSong(song_id))?;
            let board = if month { Board::Monthly } else { Board::AllTime };

            let mut fetches = JoinSet::new();
            for (&chart, &difficulty) in song.charts() {
                let client = client.clone();
                let token = token.clone();
                fetches.spawn(async move {
                    let record = client.my_record(&token, song_id, chart, board).await?;
                    Ok::<_, EngineError>(ChartRecord {
                        chart,
                        difficulty,
                        record,
                    })
                });
            }

            let mut records = Vec::new();
            while let Some(joined) = fetches.join_next().await {
                let record =
                    joined.map_err(|e| EngineError::Other(format!("Fetch task failed: {}", e)))??;
                records.push(record);
            }
            records.sort_by_key(|r| r.chart);

            println!("🎵 {}", song.name());
            for r in records {
                if r.record.score == 0 {
                    println!("   {}\t{}\t-", r.chart, r.difficulty);
                } else {
                    println!(
                        "   {}\t{}\t{}\t#{}\t{:.6}",
                        r.chart,
                        r.difficulty,
                        r.record.score,
                        r.record.rank,
                        lyricat_engine::ranking::rating(r.difficulty, r.record.score)
                    );
                }
            }
        }

        Commands::Leaderboard { song_id, chart_id, month } => {
            let song = catalog.song(song_id).ok_or(EngineError::UnknownSong(song_id))?;
            let chart = ChartKind::from_id(chart_id)
                .filter(|&c| song.difficulty(c).is_some())
                .ok_or_else(|| {
                    EngineError::Other(format!("Song {} has no chart {}", song_id, chart_id))
                })?;
            let board = if month { Board::Monthly } else { Board::AllTime };

            let entries = client.leaderboard(&token, song_id, chart, board).await?;
            println!("🏆 {}\t{}", song.name(), chart);
            if entries.is_empty() {
                println!("   No one is here...");
            }
            for entry in entries {
                println!("   {}. {}\t{}", entry.rank, entry.nickname, entry.score);
            }
        }

        Commands::Expiry => {
            let expiration = client.session_expiration(&token).await?;
            let margin = chrono::Duration::milliseconds(config.expiration_margin);
            let deadline = chrono::Utc::now() + margin;
            println!("🕐 Expires at {}", expiration.format("%Y-%m-%d %H:%M:%S UTC"));
            if expiration < deadline {
                println!("⚠️ Session token expired. Please get a new one.");
            }
        }

        Commands::Me => {
            let user = client.user(&token).await?;
            println!("👤 {}", user.nickname);
            println!("   Username: {}", user.username);
            println!("   Avatar: {}", user.head);
            if let Some(created_at) = user.created_at {
                println!("   Created: {}", created_at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }

    Ok(())
}

fn print_best(catalog: &Catalog, best: &[BestEntry]) {
    if best.is_empty() {
        println!("   Nothing here...");
        return;
    }
    for (i, entry) in best.iter().enumerate() {
        let name = catalog.song(entry.song_id).map_or("?", |s| s.name());
        println!(
            "   {}. {}\t{}\t{}\t{:.6}",
            i + 1,
            name,
            entry.chart,
            entry.raw_score,
            entry.rating
        );
    }
}
