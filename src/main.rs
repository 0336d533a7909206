use clap::{Arg, Command};
use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use filemesh::clock::SystemClock;
use filemesh::config::MeshConfig;
use filemesh::logging;
use filemesh::mesh::Mesh;
use filemesh::storage::LocalStore;
use filemesh::{sync, watcher};

fn load_config(path: &str) -> Result<MeshConfig, Box<dyn Error>> {
	let text = fs::read_to_string(path)?;
	Ok(MeshConfig::from_toml(&text)?)
}

async fn run_sync(config_path: &str, mount: &str, start_dir: &str) -> Result<(), Box<dyn Error>> {
	let config = load_config(config_path)?;
	let local = Arc::new(LocalStore::new(mount)?);
	let mesh = Mesh::from_config(local, &config).await?;

	for (name, state) in mesh.remotes_state().await {
		if !state.is_empty() {
			logging::warn!(remote = %name, reason = %state, "remote not attached");
		}
	}

	sync::sync(&mesh, start_dir, 0, None, &SystemClock).await?;
	Ok(())
}

async fn run_watch(config_path: &str, mount: &str, start_dir: &str, period_secs: u64) -> Result<(), Box<dyn Error>> {
	let config = load_config(config_path)?;
	let local = Arc::new(LocalStore::new(mount)?);
	let mesh = Arc::new(Mesh::from_config(local, &config).await?);

	let watcher = watcher::watch(mesh, start_dir.to_string(), Duration::from_secs(period_secs), None);
	watcher.join().await;
	Ok(())
}

fn run_token(config_path: &str, passphrase: Option<&str>) -> Result<(), Box<dyn Error>> {
	let config = load_config(config_path)?;
	println!("{}", config.to_token(passphrase)?);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	logging::init_tracing();

	let matches = Command::new("filemesh")
		.version("0.1.0")
		.about("Multi-backend file synchronisation mesh")
		.subcommand_required(true)
		.subcommand(
			Command::new("sync")
				.about("Run a single sync pass against every attached remote")
				.arg(Arg::new("config").short('c').long("config").value_name("FILE").required(true))
				.arg(Arg::new("mount").short('m').long("mount").value_name("DIR").required(true))
				.arg(Arg::new("dir").long("dir").value_name("PATH").default_value("")),
		)
		.subcommand(
			Command::new("watch")
				.about("Sync on a fixed period until the mesh is retired")
				.arg(Arg::new("config").short('c').long("config").value_name("FILE").required(true))
				.arg(Arg::new("mount").short('m').long("mount").value_name("DIR").required(true))
				.arg(Arg::new("dir").long("dir").value_name("PATH").default_value(""))
				.arg(Arg::new("period").long("period").value_name("SECONDS").default_value("300")),
		)
		.subcommand(
			Command::new("token")
				.about("Package a mesh configuration as a distributable token")
				.arg(Arg::new("config").short('c').long("config").value_name("FILE").required(true))
				.arg(Arg::new("passphrase").long("passphrase").value_name("SECRET")),
		)
		.get_matches();

	if let Some(m) = matches.subcommand_matches("sync") {
		let config = m.get_one::<String>("config").expect("required");
		let mount = m.get_one::<String>("mount").expect("required");
		let dir = m.get_one::<String>("dir").expect("has default");
		run_sync(config, mount, dir).await?;
	} else if let Some(m) = matches.subcommand_matches("watch") {
		let config = m.get_one::<String>("config").expect("required");
		let mount = m.get_one::<String>("mount").expect("required");
		let dir = m.get_one::<String>("dir").expect("has default");
		let period: u64 = m.get_one::<String>("period").expect("has default").parse()?;
		run_watch(config, mount, dir, period).await?;
	} else if let Some(m) = matches.subcommand_matches("token") {
		let config = m.get_one::<String>("config").expect("required");
		let passphrase = m.get_one::<String>("passphrase").map(|s| s.as_str());
		run_token(config, passphrase)?;
	}

	Ok(())
}

// vim: ts=4
