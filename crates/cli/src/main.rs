//! Data room operator CLI
//!
//! Drives the data room core against a local sled database, and carries a
//! few issuer-side helpers for producing upload tokens during development.

mod settings;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dataroom_core::{DataRoomService, UploadToken};
use dataroom_crypto::{EcdsaKey, FileDigest};
use dataroom_storage::SledKvStore;
use dataroom_types::{FileInput, KeyInput, UpdateDataRoomInput};
use serde::Serialize;
use settings::{init_logging, GlobalArgs, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[derive(Parser)]
#[command(name = "dataroom")]
#[command(about = "Data room access-control CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backend and webserver key provisioning
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Data room management
    Room {
        #[command(subcommand)]
        action: RoomCommands,
    },
    /// Issuer-side helpers (development only)
    Issuer {
        #[command(subcommand)]
        action: IssuerCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate the backend signing key pair
    InitBackend,
    /// Import the webserver's SPKI public key
    ImportWebserver(PublicKeySource),
    /// Print both public keys as PEM
    Show,
    /// Forget both key handles
    Clear,
}

#[derive(Args)]
struct PublicKeySource {
    /// SPKI public key, PEM or base64 DER
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    spki: Option<String>,
    /// Read the SPKI public key from a file
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
}

impl PublicKeySource {
    fn read(&self) -> Result<String> {
        match (&self.spki, &self.file) {
            (Some(spki), _) => Ok(spki.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("failed to read public key file {}", path.display())),
            (None, None) => bail!("either a public key or --file must be provided"),
        }
    }
}

#[derive(Subcommand)]
enum RoomCommands {
    /// Create a data room
    Create {
        /// Room id (random when omitted)
        #[arg(long)]
        id: Option<String>,
    },
    /// List data room ids
    List,
    /// Remove a data room and its file records
    Remove { id: String },
    /// List file names in a room
    Files { id: String },
    /// Show one file record
    File { id: String, name: String },
    /// List keys authorized on a room
    Keys { id: String },
    /// Admit a file with its upload token
    AddFile(AddFileCommand),
    /// Remove a file from a room
    RemoveFile { id: String, name: String },
    /// Lock a room; it can no longer be modified
    Lock { id: String },
    /// Authorize a public key on a room
    AuthorizeKey {
        id: String,
        /// Identifier for the key within the room
        #[arg(long)]
        key_id: String,
        #[command(flatten)]
        key: PublicKeySource,
    },
    /// Revoke a key from a room
    RevokeKey { id: String, key_id: String },
}

#[derive(Args)]
struct AddFileCommand {
    /// Room id
    id: String,
    /// File input as JSON (as printed by `issuer token`)
    #[arg(long, value_name = "PATH", conflicts_with_all = ["name", "digest", "token"])]
    input: Option<PathBuf>,
    /// File name
    #[arg(long, required_unless_present = "input")]
    name: Option<String>,
    /// Base64 SHA-256 digest of the content
    #[arg(long, required_unless_present = "input")]
    digest: Option<String>,
    /// Base64 upload token
    #[arg(long, required_unless_present = "input")]
    token: Option<String>,
    /// MIME type
    #[arg(long = "type", default_value = "")]
    file_type: String,
    /// Reference to the file's encryption key
    #[arg(long, default_value = "")]
    key: String,
}

impl AddFileCommand {
    fn file_input(&self) -> Result<FileInput> {
        if let Some(path) = &self.input {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read file input {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("invalid file input in {}", path.display()));
        }
        match (&self.name, &self.digest, &self.token) {
            (Some(name), Some(digest), Some(token)) => Ok(FileInput {
                name: name.clone(),
                digest_b64: digest.clone(),
                file_type: self.file_type.clone(),
                key: self.key.clone(),
                token_b64: token.clone(),
            }),
            _ => bail!("--name, --digest and --token are required without --input"),
        }
    }
}

#[derive(Subcommand)]
enum IssuerCommands {
    /// Generate an issuer key pair
    Keygen {
        /// Where to write the PKCS#8 private key
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the base64 SHA-256 digest of a file
    Digest { path: PathBuf },
    /// Sign an upload token for a file and print the file input JSON
    Token {
        /// Issuer private key (PKCS#8 PEM)
        #[arg(long, value_name = "PATH")]
        key: PathBuf,
        /// File to attest
        path: PathBuf,
        /// Name recorded in the room (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Issue time in ms since the Unix epoch (defaults to now)
        #[arg(long)]
        timestamp_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.global)?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Keys { action } => handle_key_commands(action, &open_service(&settings)?),
        Commands::Room { action } => handle_room_commands(action, &open_service(&settings)?),
        Commands::Issuer { action } => handle_issuer_commands(action),
    }
}

fn open_service(settings: &Settings) -> Result<DataRoomService<SledKvStore>> {
    let store = SledKvStore::open(&settings.db_path)
        .with_context(|| format!("failed to open database at {}", settings.db_path.display()))?;
    info!(db_path = %settings.db_path.display(), "database opened");
    Ok(DataRoomService::new(store, &settings.service))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_key_commands(cmd: KeyCommands, service: &DataRoomService<SledKvStore>) -> Result<()> {
    match cmd {
        KeyCommands::InitBackend => {
            service
                .set_backend_signing_key()
                .context("failed to create backend signing key")?;
            println!("Backend signing key created");
        }
        KeyCommands::ImportWebserver(source) => {
            service
                .set_webserver_verification_key(&source.read()?)
                .context("failed to import webserver verification key")?;
            println!("Webserver verification key imported");
        }
        KeyCommands::Show => {
            let identities = service.get_key_identities()?;
            if identities.is_empty() {
                println!("No keys have been set yet");
            } else {
                print_json(&identities)?;
            }
        }
        KeyCommands::Clear => {
            service.clear_keys()?;
            println!("Key handles cleared");
        }
    }

    service.store().flush()?;
    Ok(())
}

fn handle_room_commands(cmd: RoomCommands, service: &DataRoomService<SledKvStore>) -> Result<()> {
    match cmd {
        RoomCommands::Create { id } => {
            let id = service.create_data_room(id.as_deref())?;
            println!("{id}");
        }
        RoomCommands::List => print_json(&service.list_data_rooms()?)?,
        RoomCommands::Remove { id } => {
            service.remove_data_room(&id)?;
            println!("Data room {id} removed");
        }
        RoomCommands::Files { id } => print_json(&service.list_files(&id)?)?,
        RoomCommands::File { id, name } => print_json(&service.get_file(&id, &name)?)?,
        RoomCommands::Keys { id } => print_json(&service.list_public_keys(&id)?)?,
        RoomCommands::AddFile(cmd) => {
            let input = cmd.file_input()?;
            let name = input.name.clone();
            service
                .update_data_room(&UpdateDataRoomInput::add_file(&cmd.id, input))
                .with_context(|| format!("file {name} was not admitted"))?;
            println!("File {name} added to {}", cmd.id);
        }
        RoomCommands::RemoveFile { id, name } => {
            service.update_data_room(&UpdateDataRoomInput::remove_file(&id, &name))?;
            println!("File {name} removed from {id}");
        }
        RoomCommands::Lock { id } => {
            service.update_data_room(&UpdateDataRoomInput::lock(&id))?;
            println!("Data room {id} locked");
        }
        RoomCommands::AuthorizeKey { id, key_id, key } => {
            let input = KeyInput {
                key_id: key_id.clone(),
                spki_public_key: key.read()?,
            };
            service.update_data_room(&UpdateDataRoomInput::authorize_key(&id, input))?;
            println!("Key {key_id} authorized on {id}");
        }
        RoomCommands::RevokeKey { id, key_id } => {
            service.update_data_room(&UpdateDataRoomInput::revoke_key(&id, &key_id))?;
            println!("Key {key_id} revoked from {id}");
        }
    }

    service.store().flush()?;
    Ok(())
}

fn handle_issuer_commands(cmd: IssuerCommands) -> Result<()> {
    match cmd {
        IssuerCommands::Keygen { out, force } => {
            if out.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", out.display());
            }
            let key = EcdsaKey::generate();
            fs::write(&out, key.export_pkcs8_pem()?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(fingerprint = %key.fingerprint()?, path = %out.display(), "issuer key written");
            print!("{}", key.export_public_pem()?);
        }
        IssuerCommands::Digest { path } => {
            println!("{}", digest_file(&path)?.to_b64());
        }
        IssuerCommands::Token {
            key,
            path,
            name,
            timestamp_ms,
        } => {
            let pem = fs::read_to_string(&key)
                .with_context(|| format!("failed to read issuer key {}", key.display()))?;
            let signer = EcdsaKey::import_pkcs8_pem(&pem)?;
            let digest = digest_file(&path)?;
            let issued_at = timestamp_ms.unwrap_or_else(now_ms);
            let token = UploadToken::issue(*digest.as_bytes(), issued_at, &signer)?;

            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("cannot derive a file name; pass --name")?,
            };
            print_json(&FileInput {
                name,
                digest_b64: digest.to_b64(),
                file_type: String::new(),
                key: String::new(),
                token_b64: token.to_b64(),
            })?;
        }
    }

    Ok(())
}

fn digest_file(path: &Path) -> Result<FileDigest> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    FileDigest::from_reader(file).with_context(|| format!("failed to hash {}", path.display()))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
