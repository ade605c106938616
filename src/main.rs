use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lms_client::{
    ApiClient, ApiError, ClientConfig, CredentialStore, Environment, FormPart, KeychainStore, MemoryStore, Platform,
};

#[derive(Parser, Debug)]
#[command(name = "lms-client", about = "Command-line access to the LMS API")]
struct Args {
    /// API base URL (overrides LMS_API_URL / API_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Use production settings (timeout, terse logging, secure scheme)
    #[arg(long)]
    production: bool,

    /// Target platform: android, ios or desktop
    #[arg(long)]
    platform: Option<Platform>,

    /// Keep tokens in memory instead of the OS keychain
    #[arg(long)]
    memory_store: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the issued tokens
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Delete stored tokens
    Logout,
    /// GET a path and print the response body
    Get { path: String },
    /// DELETE a path
    Delete { path: String },
    /// POST a JSON body
    Post {
        path: String,
        #[arg(long)]
        json: String,
    },
    /// Upload a file as multipart form data
    Upload {
        path: String,
        #[arg(long, default_value = "file")]
        field: String,
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        if args.memory_store {
            run(ApiClient::new(config, MemoryStore::new())?, args.command).await
        } else {
            run(ApiClient::new(config, KeychainStore::default())?, args.command).await
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.requires_login() => {
            log::debug!("{}", e);
            eprintln!("Session expired, please log in again.");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> Result<ClientConfig, ApiError> {
    let from_env = ClientConfig::from_env()?;
    let verbosity_set = std::env::var_os("LMS_VERBOSITY").is_some();
    Ok(apply_overrides(args, from_env, verbosity_set))
}

/// Layer CLI flags over the environment configuration. An explicit
/// `LMS_VERBOSITY` survives the rebuild.
fn apply_overrides(args: &Args, from_env: ClientConfig, verbosity_set: bool) -> ClientConfig {
    if args.base_url.is_none() && !args.production && args.platform.is_none() {
        return from_env;
    }

    let base_url = args.base_url.clone().unwrap_or_else(|| from_env.base_url().to_string());
    let environment = if args.production {
        Environment::Production
    } else {
        from_env.environment()
    };
    let platform = args.platform.unwrap_or(from_env.platform());
    let config = ClientConfig::new(&base_url, environment, platform);
    if verbosity_set {
        config.with_verbosity(from_env.verbosity())
    } else {
        config
    }
}

fn parse_json_body(json: &str) -> Result<serde_json::Value, ApiError> {
    serde_json::from_str(json).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e)))
}

async fn run<S: CredentialStore>(client: ApiClient<S>, command: Command) -> Result<(), ApiError> {
    let resp = match command {
        Command::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("Logged in.");
            return Ok(());
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out.");
            return Ok(());
        }
        Command::Get { path } => client.get(&path).await?,
        Command::Delete { path } => client.delete(&path).await?,
        Command::Post { path, json } => {
            let body = parse_json_body(&json)?;
            client.post_json(&path, &body).await?
        }
        Command::Upload { path, field, file } => {
            let bytes = std::fs::read(&file)
                .map_err(|e| ApiError::Validation(format!("Failed to read {}: {}", file.display(), e)))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            client.post_multipart(&path, vec![FormPart::file(field, file_name, bytes)]).await?
        }
    };

    let url = resp.url().to_string();
    let body = resp.text().await.map_err(|source| ApiError::Decode { url, source })?;
    println!("{}", body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_client::Verbosity;

    fn env_config(verbosity: Verbosity) -> ClientConfig {
        ClientConfig::new("http://localhost:5000", Environment::Development, Platform::Desktop)
            .with_verbosity(verbosity)
    }

    #[test]
    fn flags_keep_explicit_verbosity() {
        let args = Args::parse_from(["lms-client", "--production", "get", "/courses"]);
        let config = apply_overrides(&args, env_config(Verbosity::Verbose), true);
        assert_eq!(config.environment(), Environment::Production);
        assert_eq!(config.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn flags_without_verbosity_use_environment_default() {
        let args = Args::parse_from(["lms-client", "--platform", "android", "get", "/courses"]);
        let config = apply_overrides(&args, env_config(Verbosity::Terse), false);
        assert_eq!(config.platform(), Platform::Android);
        assert_eq!(config.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn no_flags_returns_env_config() {
        let args = Args::parse_from(["lms-client", "logout"]);
        let config = apply_overrides(&args, env_config(Verbosity::Terse), false);
        assert_eq!(config.verbosity(), Verbosity::Terse);
    }

    #[test]
    fn invalid_json_body_is_a_validation_error() {
        let err = parse_json_body("{not json").unwrap_err();
        match err {
            ApiError::Validation(msg) => assert!(msg.starts_with("Invalid JSON body:")),
            other => panic!("expected Validation, got {:?}", other),
        }
        assert_eq!(parse_json_body(r#"{"a":1}"#).unwrap()["a"], 1);
    }
}
