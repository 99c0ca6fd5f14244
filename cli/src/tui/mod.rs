//! Interactive console.

mod app;
mod input;
mod runner;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use podfwd_core::ports::KeyAction;
use podfwd_core::{
    Config, ControllerSettings, ForwardUi, ForwarderRegistry, KubectlTransport,
    KubernetesDiscovery, SessionController, UiQueue,
};
use tracing::info;

use app::App;
use runner::{PodLoader, TuiRunner};

pub async fn run(config: Config, namespace: String) -> Result<()> {
    let discovery = KubernetesDiscovery::from_config(&config);
    let registry = Arc::new(ForwarderRegistry::new());
    let (queue, mut rx) = UiQueue::channel();

    let controller = SessionController::new(
        Arc::new(discovery.clone()),
        Arc::new(KubectlTransport::from_config(&config)),
        Arc::clone(&registry),
        queue.clone(),
        ControllerSettings::from_config(&config),
    );

    let mut app = App::new(namespace.clone(), Arc::clone(&registry));
    app.keys.add(
        'r',
        KeyAction::new(
            "Refresh",
            |app: &mut App| {
                app.refresh();
                true
            },
            true,
        ),
    );
    controller.bind_keys(&mut app.keys);

    let pods = PodLoader::new(discovery, queue, namespace);
    let result = {
        let mut runner = TuiRunner::new()?;
        runner.run(&mut app, &mut rx, &pods).await
    };

    // Tunnels do not outlive the console
    let closed = controller.stop_all();
    if closed > 0 {
        info!(count = closed, "Closed port-forwards on exit");
    }

    Ok(result?)
}
