//! Example: a local directory in front of a legacy object store, with data
//! migration turned on.
//!
//! Run with:
//! ```sh
//! RUST_LOG=fallback_storage=debug cargo run --example fallback_migration
//! ```

use fallback_storage::{
    BackendDescriptor, BackendResolver, FallbackConfig, FallbackStorage, MemoryStorage, Storage,
    StorageExt,
};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let media_root = TempDir::new()?;

    // Stands in for the bucket every file used to live in.
    let legacy = MemoryStorage::new().with_base_url("https://legacy.example.com/media/");
    legacy.save_bytes("avatars/alice.png", b"\x89PNG...").await?;
    legacy.save_bytes("docs/terms.txt", b"Terms of service").await?;

    let config = FallbackConfig::new(vec![
        BackendDescriptor::Local {
            root: media_root.path().to_path_buf(),
            base_url: Some("/media/".to_string()),
        },
        BackendDescriptor::Named {
            name: "legacy".to_string(),
        },
    ])
    .with_data_migration(true);
    let resolver = BackendResolver::new().register("legacy", legacy.clone());
    let storage = FallbackStorage::from_config(&config, &resolver)?;

    println!("--- Before any reads ---");
    println!("  terms.txt url: {}", storage.url("docs/terms.txt").await?);
    let root = storage.listdir("").await?;
    println!("  directories: {:?}", root.directories);

    println!("--- Reading through the fallback chain ---");
    let terms = storage.read_string("docs/terms.txt").await?;
    println!("  docs/terms.txt: {terms}");

    // The read copied the file into the local directory.
    let local_copy = media_root.path().join("docs/terms.txt");
    println!("  migrated locally: {}", local_copy.is_file());
    println!("  path: {}", storage.path("docs/terms.txt").await?.display());

    println!("--- New uploads land in the primary ---");
    let name = storage.get_available_name("docs/terms.txt").await?;
    storage.save_bytes(&name, b"Revised terms").await?;
    println!("  saved as {name}");
    println!("  legacy has it: {}", legacy.exists(&name).await?);

    Ok(())
}
