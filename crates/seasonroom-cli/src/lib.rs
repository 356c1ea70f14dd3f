pub mod cli;
pub mod commands;
pub mod render;

use std::ffi::OsString;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use seasonroom_client::{
  ApiClient,
  FileTokenStore,
  TokenStore
};
use seasonroom_core::clock::SystemClock;
use seasonroom_core::config;
use seasonroom_core::Clock;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting seasonroom CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rcfile.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let token_store = Arc::new(
    FileTokenStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open token store \
           at {}",
          data_dir.display()
        )
      })?
  );
  let tokens: Arc<dyn TokenStore> =
    token_store.clone();
  let client = Arc::new(
    ApiClient::from_config(
      &cfg, tokens
    )?
  );
  let clock: Arc<dyn Clock> = Arc::new(
    SystemClock::from_config(&cfg)
  );

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv =
    cli::Invocation::parse(cli.rest)?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let ctx = commands::AppContext {
    cfg,
    client,
    clock,
    token_store,
    renderer
  };
  runtime.block_on(
    commands::dispatch(&ctx, inv)
  )?;

  info!("done");
  Ok(())
}
