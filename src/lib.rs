mod cache;
mod config;
mod errors;
mod gazetteer;
mod normalize;
mod offline;
mod online;
mod resolver;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::{CachedPair, GeocodeCache};
pub use config::AppConfig;
pub use errors::{ResolverError, ResolverResult};
pub use gazetteer::GazetteerIndex;
pub use normalize::{normalize, to_canonical_label, translate_script_hints};
pub use offline::OfflineResolver;
pub use online::{GeocodeHit, GeocodeLookup, NominatimClient, OnlineResolver};
pub use resolver::{
    resolve_batch, Mode, ResolvedPair, Resolution, ResolverEngine, ResolverOptions, NOT_FOUND,
};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,bd_address_resolver=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
