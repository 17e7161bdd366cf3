//! Example walking a plugin type through discovery, install, load and unload.

use std::sync::Arc;

use plugin_registry::{
    Delegate, DiscoveryContext, LaunchOptions, ManifestBuilder, Metadata, Parameters, Plugin,
    PluginRegistry, PluginRuntime, PluginType, RuntimeConfig,
};

struct Announcer;

impl Delegate for Announcer {
    fn application_did_launch(
        &self,
        plugin: &dyn Plugin,
        options: &LaunchOptions,
    ) -> plugin_registry::Result<()> {
        println!("  {} sees launch with {:?}", plugin.name(), options);
        Ok(())
    }

    fn plugin_did_load(&self, plugin: &dyn Plugin) -> plugin_registry::Result<()> {
        println!("  {} loaded", plugin.name());
        Ok(())
    }
}

struct Formatter {
    name: String,
    width: usize,
}

impl Plugin for Formatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn delegate(&self) -> Arc<dyn Delegate> {
        Arc::new(Announcer)
    }
}

impl PluginType for Formatter {
    fn discover(ctx: &DiscoveryContext) -> plugin_registry::Result<Vec<Self>> {
        ctx.manifests_for(Self::type_name())
            .map(|m| {
                let params = Self::construct_parameters(&m.info())?;
                Ok::<_, plugin_registry::Error>(Formatter {
                    name: params["name"].clone(),
                    width: params["width"].parse().unwrap_or(80),
                })
            })
            .collect()
    }

    fn construct_parameters(metadata: &Metadata) -> plugin_registry::Result<Parameters> {
        let mut params = metadata.clone();
        params.entry("width".into()).or_insert_with(|| "80".into());
        Ok(params)
    }

    fn current() -> Option<plugin_registry::PluginHandle<Self>> {
        PluginRegistry::<Self>::standard().loaded().into_iter().next()
    }
}

fn main() -> plugin_registry::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Discovery ===");
    let ctx = DiscoveryContext::new()
        .with_manifest(
            ManifestBuilder::new("wide", Formatter::type_name())
                .metadata("width", "120")
                .build()?,
        )
        .with_manifest(ManifestBuilder::new("narrow", Formatter::type_name()).build()?);

    let runtime = PluginRuntime::new(
        RuntimeConfig::new()
            .with_auto_load(true)
            .with_launch_option("profile", "demo"),
    )?;
    runtime.on_event(|event| println!("  event: {} {}", event.event_name(), event.plugin_name()));

    let formatters = runtime.discover_and_install::<Formatter>(&ctx)?;
    for f in &formatters {
        println!("  {} (width {}) is {}", f.name(), f.width, f.state());
    }

    println!("\n=== Launch ===");
    runtime.launch()?;

    println!("\n=== Current ===");
    if let Some(current) = runtime.current() {
        println!("  current plugin: {} ({})", current.name(), current.kind());
    }

    println!("\n=== Services ===");
    let wide = PluginRegistry::<Formatter>::standard().plugin("wide")?;
    wide.services().register("line-ending", String::from("\n"));
    println!("  {} services: {:?}", wide.services().scope(), wide.services().names());

    println!("\n=== Shutdown ===");
    for result in runtime.unload_all() {
        result?;
    }
    println!("  stats: {:?}", runtime.stats());

    Ok(())
}
