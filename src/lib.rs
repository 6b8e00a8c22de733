pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod janitor;

use tokio::signal;

pub use config::Config;
use db::{Role, Store};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "serve" | "daemon" | "-d" | "--daemon" => run_server(config).await,

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "user" => {
            if args.len() < 3 {
                println!("Usage: stockd user <subcommand>");
                println!("Subcommands: add, list, remove");
                return Ok(());
            }
            match args[2].as_str() {
                "add" => {
                    if args.len() < 5 {
                        println!("Usage: stockd user add <username> <password> [role]");
                        println!("Example: stockd user add alice s3cret-pass admin");
                        return Ok(());
                    }
                    let username = &args[3];
                    let password = &args[4];
                    let role = args.get(5).map(|s| s.as_str());
                    cmd_user_add(&config, username, password, role).await
                }
                "list" | "ls" => cmd_user_list(&config).await,
                "remove" | "rm" => {
                    if args.len() < 4 {
                        println!("Usage: stockd user remove <user_id>");
                        println!("Use 'stockd user list' to see IDs");
                        return Ok(());
                    }
                    cmd_user_remove(&config, &args[3]).await
                }
                _ => {
                    println!("Unknown user subcommand: {}", args[2]);
                    println!("Use: add, list, remove");
                    Ok(())
                }
            }
        }

        "purge-sessions" => cmd_purge_sessions(&config).await,

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Stockd - Inventory Tracking Backend");
    println!("Audited stock levels over a REST API");
    println!();
    println!("USAGE:");
    println!("  stockd <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  serve             Run the API server");
    println!("  user add <name> <password> [role]");
    println!("                    Create a user (role: admin or user, default user)");
    println!("  user list         List all users");
    println!("  user remove <id>  Delete a user and their sessions");
    println!("  purge-sessions    Delete expired sessions now");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  stockd init                        # Write config.toml");
    println!("  stockd user add alice pass1234     # Create a regular user");
    println!("  stockd user add root hunter22 admin");
    println!("  stockd serve                       # Start the API server");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the database, server port, etc.");
    println!("  DATABASE_URL overrides the configured database.");
}

async fn open_store(config: &Config) -> anyhow::Result<Store> {
    let store = Store::with_pool_options(
        &config.general.database_url,
        config.security.clone(),
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;
    Ok(store)
}

async fn cmd_user_add(
    config: &Config,
    username: &str,
    password: &str,
    role: Option<&str>,
) -> anyhow::Result<()> {
    let role = match role {
        None => Role::User,
        Some(raw) => Role::parse(raw)?,
    };

    let store = open_store(config).await?;
    let id = store.create_user(username, password, role).await?;

    println!("✓ Created user '{}' (ID: {})", username, id);
    println!("  Role: {}", role.as_str());

    Ok(())
}

async fn cmd_user_list(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let users = store.list_users().await?;

    if users.is_empty() {
        println!("No users exist yet.");
        println!();
        println!("Add one with: stockd user add <username> <password> [role]");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<60}", "");

    for user in users {
        println!("• {} [{}]", user.username, user.role.as_str());
        println!("  ID: {} | Created: {}", user.id, user.created_at);
    }

    Ok(())
}

async fn cmd_user_remove(config: &Config, id_str: &str) -> anyhow::Result<()> {
    let id: i32 = match id_str.parse() {
        Ok(id) => id,
        Err(_) => {
            println!("Invalid user ID: {}", id_str);
            println!("Use 'stockd user list' to see user IDs.");
            return Ok(());
        }
    };

    let store = open_store(config).await?;

    match store.delete_user(id).await {
        Ok(_) => {
            println!("✓ Removed user {}", id);
            Ok(())
        }
        Err(error::CoreError::NotFound(_)) => {
            println!("User with ID {} not found.", id);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_purge_sessions(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let purged = store.purge_expired_sessions().await?;

    println!("✓ Purged {} expired sessions", purged);
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(
        "Stockd v{} starting in server mode...",
        env!("CARGO_PKG_VERSION")
    );

    let state = api::create_app_state_from_config(config.clone()).await?;

    state.store().ensure_default_admin().await?;

    let janitor_handle = {
        let store = state.store().clone();
        let interval = config.sessions.purge_interval_minutes;
        tokio::spawn(async move {
            janitor::run(store, interval).await;
        })
    };

    let port = config.server.port;
    let app = api::router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server running at http://0.0.0.0:{}", port);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    janitor_handle.abort();
    server_handle.abort();
    info!("Server stopped");

    Ok(())
}
