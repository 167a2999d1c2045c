use travelshare_sync::api;
use travelshare_sync::common::init;
use travelshare_sync::settings::AppSettings;
use travelshare_sync::workers::daemons;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = AppSettings::get();
    init::initialize_logging(settings);
    match settings.app_component.as_str() {
        "api" => api::serve(settings).await,
        "follow" => match daemons::follower::serve(settings).await? {},
        component => anyhow::bail!("Unknown app component: {component}"),
    }
}
