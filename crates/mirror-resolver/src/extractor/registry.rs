use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use url::Url;

use super::handler::{Resolution, ResolveContext, StreamHandler};
use super::providers::{
    self, bigwarp::Bigwarp, buzz::Buzz, cda::Cda, dailymotion::Dailymotion, default::Generic,
    dood::Dood, f16px::F16px, filemoon::Filemoon, gdrive::Gdrive, lulustream::Lulustream,
    lycoris::Lycoris, mp4upload::Mp4upload, okru::Okru, pixeldrain::Pixeldrain, rumble::Rumble,
    savefiles::Savefiles, sibnet::Sibnet, streamtape::Streamtape, streamup::Streamup,
    turbovid::Turbovid, upn::Upn, uqload::Uqload, vidnest::Vidnest, vidtube::Vidtube, vk::Vk,
    voe::Voe,
};
use crate::config::ProvidersConfig;
use crate::media::MirrorEntry;

pub const DEFAULT_PROVIDER: &str = "default";

// A type alias for a handler constructor.
type HandlerConstructor = fn() -> Arc<dyn StreamHandler>;

struct ProviderEntry {
    name: &'static str,
    domains: &'static [&'static str],
    aliases: &'static [&'static str],
    requires_privilege: bool,
    constructor: HandlerConstructor,
}

// Macro to create a constructor function for a given handler
macro_rules! create_constructor {
    ($name:ident, $handler:expr) => {
        fn $name() -> Arc<dyn StreamHandler> {
            Arc::new($handler)
        }
    };
}

create_constructor!(new_cda, Cda);
create_constructor!(new_lycoris, Lycoris);
create_constructor!(new_okru, Okru);
create_constructor!(new_sibnet, Sibnet);
create_constructor!(new_uqload, Uqload);
create_constructor!(new_dood, Dood);
create_constructor!(new_streamtape, Streamtape);
create_constructor!(new_mp4upload, Mp4upload);
create_constructor!(new_vidnest, Vidnest);
create_constructor!(new_pixeldrain, Pixeldrain);
create_constructor!(new_filemoon, Filemoon);
create_constructor!(new_lulustream, Lulustream);
create_constructor!(new_savefiles, Savefiles);
create_constructor!(new_f16px, F16px);
create_constructor!(new_upn, Upn);
create_constructor!(new_streamup, Streamup);
create_constructor!(new_voe, Voe);
create_constructor!(new_dailymotion, Dailymotion::default());
create_constructor!(new_vk, Vk);
create_constructor!(new_rumble, Rumble);
create_constructor!(new_gdrive, Gdrive::default());
create_constructor!(new_buzz, Buzz);
create_constructor!(new_turbovid, Turbovid);
create_constructor!(new_bigwarp, Bigwarp);
create_constructor!(new_vidtube, Vidtube);
create_constructor!(new_generic, Generic);

// Static provider registry, searched in declaration order
static PROVIDERS: &[ProviderEntry] = &[
    ProviderEntry {
        name: "cda",
        domains: providers::cda::DOMAINS,
        aliases: &["cda"],
        requires_privilege: false,
        constructor: new_cda,
    },
    ProviderEntry {
        name: "lycoris",
        domains: providers::lycoris::DOMAINS,
        aliases: &["lycoris.cafe", "lycoris"],
        requires_privilege: false,
        constructor: new_lycoris,
    },
    ProviderEntry {
        name: "okru",
        domains: providers::okru::DOMAINS,
        aliases: &["ok", "okru", "ok.ru"],
        requires_privilege: false,
        constructor: new_okru,
    },
    ProviderEntry {
        name: "sibnet",
        domains: providers::sibnet::DOMAINS,
        aliases: &["sibnet"],
        requires_privilege: false,
        constructor: new_sibnet,
    },
    ProviderEntry {
        name: "uqload",
        domains: providers::uqload::DOMAINS,
        aliases: &["uqload"],
        requires_privilege: false,
        constructor: new_uqload,
    },
    ProviderEntry {
        name: "dood",
        domains: providers::dood::DOMAINS,
        aliases: &["dood", "doodstream"],
        requires_privilege: false,
        constructor: new_dood,
    },
    ProviderEntry {
        name: "streamtape",
        domains: providers::streamtape::DOMAINS,
        aliases: &["streamtape"],
        requires_privilege: false,
        constructor: new_streamtape,
    },
    ProviderEntry {
        name: "mp4upload",
        domains: providers::mp4upload::DOMAINS,
        aliases: &["mp4upload"],
        requires_privilege: false,
        constructor: new_mp4upload,
    },
    ProviderEntry {
        name: "vidnest",
        domains: providers::vidnest::DOMAINS,
        aliases: &["vidnest"],
        requires_privilege: false,
        constructor: new_vidnest,
    },
    ProviderEntry {
        name: "pixeldrain",
        domains: providers::pixeldrain::DOMAINS,
        aliases: &["pixeldrain"],
        requires_privilege: false,
        constructor: new_pixeldrain,
    },
    ProviderEntry {
        name: "filemoon",
        domains: providers::filemoon::DOMAINS,
        aliases: &["filemoon"],
        requires_privilege: false,
        constructor: new_filemoon,
    },
    ProviderEntry {
        name: "lulustream",
        domains: providers::lulustream::DOMAINS,
        aliases: &["lulustream", "luluvdo"],
        requires_privilege: false,
        constructor: new_lulustream,
    },
    ProviderEntry {
        name: "savefiles",
        domains: providers::savefiles::DOMAINS,
        aliases: &["savefiles"],
        requires_privilege: false,
        constructor: new_savefiles,
    },
    ProviderEntry {
        name: "f16px",
        domains: providers::f16px::DOMAINS,
        aliases: &["f16px"],
        requires_privilege: false,
        constructor: new_f16px,
    },
    ProviderEntry {
        name: "upn",
        domains: providers::upn::DOMAINS,
        aliases: &["upn", "upns"],
        requires_privilege: false,
        constructor: new_upn,
    },
    ProviderEntry {
        name: "streamup",
        domains: providers::streamup::DOMAINS,
        aliases: &["streamup"],
        requires_privilege: false,
        constructor: new_streamup,
    },
    ProviderEntry {
        name: "voe",
        domains: providers::voe::DOMAINS,
        aliases: &["voe"],
        requires_privilege: true,
        constructor: new_voe,
    },
    ProviderEntry {
        name: "dailymotion",
        domains: providers::dailymotion::DOMAINS,
        aliases: &["dailymotion"],
        requires_privilege: false,
        constructor: new_dailymotion,
    },
    ProviderEntry {
        name: "vk",
        domains: providers::vk::DOMAINS,
        aliases: &["vk"],
        requires_privilege: false,
        constructor: new_vk,
    },
    ProviderEntry {
        name: "rumble",
        domains: providers::rumble::DOMAINS,
        aliases: &["rumble"],
        requires_privilege: false,
        constructor: new_rumble,
    },
    ProviderEntry {
        name: "gdrive",
        domains: providers::gdrive::DOMAINS,
        aliases: &["gdrive", "google drive"],
        requires_privilege: false,
        constructor: new_gdrive,
    },
    ProviderEntry {
        name: "buzz",
        domains: providers::buzz::DOMAINS,
        aliases: &["buzz", "buzzheavier"],
        requires_privilege: false,
        constructor: new_buzz,
    },
    ProviderEntry {
        name: "turbovid",
        domains: providers::turbovid::DOMAINS,
        aliases: &["turbovid"],
        requires_privilege: false,
        constructor: new_turbovid,
    },
    ProviderEntry {
        name: "bigwarp",
        domains: providers::bigwarp::DOMAINS,
        aliases: &["bigwarp"],
        requires_privilege: false,
        constructor: new_bigwarp,
    },
    ProviderEntry {
        name: "vidtube",
        domains: providers::vidtube::DOMAINS,
        aliases: &["vidtube"],
        requires_privilege: false,
        constructor: new_vidtube,
    },
    ProviderEntry {
        name: DEFAULT_PROVIDER,
        domains: &[],
        aliases: &[],
        requires_privilege: false,
        constructor: new_generic,
    },
];

/// Everything the registry knows about one provider.
pub struct ProviderDescriptor {
    pub name: String,
    pub domain_patterns: Vec<String>,
    pub aliases: Vec<String>,
    pub enabled: bool,
    pub requires_privilege: bool,
    pub handler: Arc<dyn StreamHandler>,
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("domain_patterns", &self.domain_patterns)
            .field("aliases", &self.aliases)
            .field("enabled", &self.enabled)
            .field("requires_privilege", &self.requires_privilege)
            .finish_non_exhaustive()
    }
}

impl ProviderDescriptor {
    pub fn new<S: Into<String>>(name: S, handler: Arc<dyn StreamHandler>) -> Self {
        Self {
            name: name.into(),
            domain_patterns: Vec::new(),
            aliases: Vec::new(),
            enabled: true,
            requires_privilege: false,
            handler,
        }
    }

    pub fn with_domains(mut self, domains: &[&str]) -> Self {
        self.domain_patterns = domains.iter().map(|d| d.to_lowercase()).collect();
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_lowercase()).collect();
        self
    }

    pub fn privileged(mut self, requires_privilege: bool) -> Self {
        self.requires_privilege = requires_privilege;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn from_entry(entry: &ProviderEntry, config: &ProvidersConfig) -> Self {
        Self::new(entry.name, (entry.constructor)())
            .with_domains(entry.domains)
            .with_aliases(entry.aliases)
            .privileged(entry.requires_privilege)
            .enabled(!config.is_disabled(entry.name))
    }

    /// `locator` must already be lower-cased.
    fn matches_domain(&self, locator: &str) -> bool {
        self.domain_patterns
            .iter()
            .any(|pattern| locator.contains(pattern.as_str()))
    }

    fn matches_alias(&self, label: &str) -> bool {
        self.name.eq_ignore_ascii_case(label)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(label))
    }

    /// Runs the handler and folds every failure into [`Resolution::NoResult`].
    pub async fn invoke(&self, ctx: &ResolveContext, locator: &str) -> Resolution {
        if self.requires_privilege && !ctx.privileged {
            debug!(provider = %self.name, "skipping, privileged request required");
            return Resolution::NoResult;
        }

        match self.handler.resolve(ctx, locator).await {
            Ok(media) if media.url.is_empty() => {
                info!(provider = %self.name, locator, "handler returned an empty url");
                Resolution::NoResult
            }
            Ok(media) => {
                debug!(
                    provider = %self.name,
                    url = %media.url,
                    quality = %media.quality,
                    "resolved"
                );
                Resolution::Resolved(media)
            }
            Err(e) => {
                match e.severity() {
                    tracing::Level::WARN => {
                        warn!(provider = %self.name, locator, "resolution failed: {e}")
                    }
                    tracing::Level::INFO => {
                        info!(provider = %self.name, locator, "resolution failed: {e}")
                    }
                    _ => debug!(provider = %self.name, locator, "resolution failed: {e}"),
                }
                Resolution::NoResult
            }
        }
    }
}

/// Packed jwplayer hosts without a dedicated handler that the generic
/// handler copes with.
static DEFAULT_HOST_PATTERNS: &[&str] = &["earnvid", "streamwish", "vidhide", "filelions"];

/// Immutable lookup from mirror entries to provider descriptors.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    descriptors: Vec<Arc<ProviderDescriptor>>,
    default_patterns: Vec<String>,
}

impl ProviderRegistry {
    /// All built-in providers, with `config.disabled` applied.
    pub fn builtin(config: &ProvidersConfig) -> Self {
        let descriptors = PROVIDERS
            .iter()
            .map(|entry| ProviderDescriptor::from_entry(entry, config))
            .collect();
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(descriptors: Vec<ProviderDescriptor>) -> Self {
        Self {
            descriptors: descriptors.into_iter().map(Arc::new).collect(),
            default_patterns: DEFAULT_HOST_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn with_default_patterns(mut self, patterns: &[&str]) -> Self {
        self.default_patterns = patterns.iter().map(|p| p.to_lowercase()).collect();
        self
    }

    pub fn descriptors(&self) -> &[Arc<ProviderDescriptor>] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ProviderDescriptor>> {
        self.descriptors
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Picks the descriptor for `entry`: a domain match first, then an alias
    /// match on the provider label, then the generic handler for a small set
    /// of known hosts. `None` means the entry is not dispatched at all.
    pub fn route(&self, entry: &MirrorEntry) -> Option<Arc<ProviderDescriptor>> {
        let locator = normalize_locator(&entry.locator).to_lowercase();
        let enabled = || self.descriptors.iter().filter(|d| d.enabled);

        if let Some(descriptor) = enabled().find(|d| d.matches_domain(&locator)) {
            trace!(provider = %descriptor.name, "routed by domain");
            return Some(descriptor.clone());
        }

        let label = entry.provider_label.trim();
        let by_alias = enabled()
            .filter(|d| d.name != DEFAULT_PROVIDER)
            .find(|d| !label.is_empty() && d.matches_alias(label));
        if let Some(descriptor) = by_alias {
            trace!(provider = %descriptor.name, label, "routed by alias");
            return Some(descriptor.clone());
        }

        let host = Url::parse(&locator)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))?;
        if self.default_patterns.iter().any(|p| host.contains(p.as_str())) {
            return enabled()
                .find(|d| d.name == DEFAULT_PROVIDER)
                .inspect(|_| trace!(host, "routed to the generic handler"))
                .cloned();
        }

        trace!(locator = %entry.locator, label, "unroutable mirror");
        None
    }
}

/// Trims the locator and gives scheme-relative links an `https` scheme.
pub fn normalize_locator(locator: &str) -> String {
    let trimmed = locator.trim();
    if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        trimmed.to_string()
    }
}
