//! chatplays-server/src/context.rs
//!
//! Builds the pipeline and its back-ends from the parsed arguments.

use std::sync::Arc;
use tracing::info;

use chatplays_core::platforms::executors::{
    CommandExecutor, EmulatorBridgeExecutor, KeyMap, KeyboardExecutor, XdotoolKeySink,
};
use chatplays_core::platforms::identity::{AtprotoIdentityResolver, IdentityResolver};
use chatplays_core::{ChatPlaysService, DefaultHttpClient, Error};

use crate::config::{Args, ExecutorKind};

pub struct ServerContext {
    pub args: Args,
    pub service: Arc<ChatPlaysService>,
}

impl ServerContext {
    pub fn new(args: Args) -> Result<Self, Error> {
        let executor = build_executor(&args)?;
        let resolver = build_resolver(&args)?;
        let service = Arc::new(ChatPlaysService::new(args.pipeline_config(), executor, resolver));
        Ok(Self { args, service })
    }
}

pub fn build_executor(args: &Args) -> Result<Arc<dyn CommandExecutor>, Error> {
    match args.executor {
        ExecutorKind::Keyboard => {
            let keymap = match &args.keymap {
                Some(overrides) => KeyMap::default().with_overrides(overrides)?,
                None => KeyMap::default(),
            };
            info!("Dispatching commands as key presses via '{}'", args.xdotool);
            let sink = XdotoolKeySink::with_program(args.xdotool.clone());
            Ok(Arc::new(KeyboardExecutor::new(sink, keymap)))
        }
        ExecutorKind::Bridge => {
            info!("Dispatching commands to emulator bridge at {}", args.bridge_addr);
            Ok(Arc::new(
                EmulatorBridgeExecutor::new(args.bridge_addr.clone()).with_timeout(args.socket_timeout()),
            ))
        }
    }
}

pub fn build_resolver(args: &Args) -> Result<Arc<dyn IdentityResolver>, Error> {
    let http = Arc::new(DefaultHttpClient::new()?);
    Ok(Arc::new(
        AtprotoIdentityResolver::new(http)
            .with_plc_directory(args.plc_directory.clone())
            .with_profile_service(args.profile_service.clone()),
    ))
}
