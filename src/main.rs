//! Discord linked-roles bridge binary.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use tokio::net::TcpListener;
// self
use linked_roles::{
	config::{Cli, Command, CommonArgs, ServeArgs},
	discord::{DiscordBot, DiscordEndpoints, DiscordGateway},
	events::RoleEventQueue,
	flows::Linker,
	http::ReqwestHttpClient,
	obs,
	server,
	store::FileStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let cli = Cli::load();

	obs::install_subscriber();

	match cli.command {
		Command::Serve(args) => serve(args).await,
		Command::RegisterMetadata(args) => register_metadata(args).await,
	}
}

fn bot(args: &CommonArgs, http: ReqwestHttpClient, endpoints: Arc<DiscordEndpoints>) -> DiscordBot {
	DiscordBot::new(http, endpoints, args.bot_token(), args.guild_id)
}

async fn serve(args: ServeArgs) -> Result<()> {
	let roles = args.common.role_mapping()?;
	let endpoints = DiscordEndpoints::production()?;
	let http = ReqwestHttpClient::new(args.common.http_timeout())?;
	let store = Arc::new(
		FileStore::open(args.token_store.clone())
			.wrap_err_with(|| format!("failed to open {}", args.token_store.display()))?,
	);
	let bot = Arc::new(
		bot(&args.common, http.clone(), Arc::new(endpoints.clone()))
			.with_log_channel(args.log_channel_id),
	);
	let gateway_url = endpoints.gateway.clone();
	let linker = Arc::new(Linker::new(
		store,
		bot.clone(),
		bot,
		roles,
		endpoints,
		args.oauth_client(),
		http,
	)?);
	let queue = Arc::new(RoleEventQueue::new(linker.clone()));
	let gateway =
		DiscordGateway::new(gateway_url, args.common.bot_token(), args.common.guild_id, queue);
	let listener = TcpListener::bind(args.bind_addr)
		.await
		.wrap_err_with(|| format!("failed to bind {}", args.bind_addr))?;

	tracing::info!(guild_id = %args.common.guild_id, roles = linker.roles.len(), "bridge starting");

	tokio::select! {
		result = server::serve(listener, linker, shutdown_signal()) => result?,
		_ = gateway.run() => {},
	}

	tracing::info!("bridge stopped");

	Ok(())
}

async fn register_metadata(args: CommonArgs) -> Result<()> {
	let roles = args.role_mapping()?;
	let endpoints = Arc::new(DiscordEndpoints::production()?);
	let http = ReqwestHttpClient::new(args.http_timeout())?;
	let fields = bot(&args, http, endpoints)
		.register_metadata_schema(&args.client_id, &roles)
		.await
		.wrap_err("metadata schema registration failed")?;

	for field in &fields {
		tracing::info!(key = %field.key, name = %field.name, "metadata field registered");
	}

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}

	tracing::info!("shutdown signal received");
}
