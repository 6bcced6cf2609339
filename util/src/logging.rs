use tracing_subscriber::EnvFilter;

/// Workspace crates whose events are shown by default.
const CRATE_TARGETS: &[&str] = &[
  "na_core",
  "na_discrete_filtering",
  "na_quadrature",
  "nla_factorize",
  "util",
];

/// Installs a formatting subscriber.
///
/// Mapping:
/// - 0 -> warn
/// - 1 -> info
/// - 2 -> debug
/// - 3+ -> trace
///
/// `RUST_LOG` overrides `verbosity` when set. Calling this again once a
/// subscriber is installed does nothing.
pub fn init(verbosity: u8) {
  let level = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let default_filter: String = CRATE_TARGETS
    .iter()
    .map(|t| format!("{t}={level}"))
    .collect::<Vec<_>>()
    .join(",");

  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(default_filter));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .try_init();
}

#[test]
fn init_twice_is_harmless() {
  init(0);
  init(3);
  tracing::info!("still logging");
}
