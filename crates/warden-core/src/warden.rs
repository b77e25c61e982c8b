//! The unified Warden facade.
//!
//! This module provides the main entry point for the LLM Warden security
//! system. The [`Warden`] struct owns the scanner chains, the cost tracker,
//! the audit logger and the scan cache, and exposes the small surface that
//! provider wrappers and middleware call.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use warden_firewall::{CustomRule, HeuristicConfig, HeuristicScanner, PiiConfig, PiiScanner};
use warden_monitor::{
    AuditExtras, AuditLogger, AuditLoggerConfig, AuditStore, BudgetCheck, BudgetConfig,
    BudgetStore, ConsoleAuditStore, CostRecord, CostTracker, MemoryAuditStore,
    MemoryBudgetStore, PricingTable, ScanCache, GLOBAL_ENTITY,
};
use warden_policy::{PolicyEngine, PresetName, ScanContext, ScanResult, ScannerChain};
use warden_registry::{pin_manifest, PinStore, ToolManifestPin, ToolPolicyConfig, ToolPolicyScanner};

use crate::{
    config::{AuditStoreKind, WardenConfig},
    error::WardenError,
    Result,
};

/// The unified LLM Warden security facade.
///
/// Warden wires three scanners into one chain per preset:
/// - **Heuristic**: prompt-injection scoring
/// - **PII**: detection, validation and masking
/// - **Tool Policy**: permissions, chain depth and manifest drift
///
/// # Security Model
///
/// Scanning is synchronous and side-effect free apart from the cache and
/// the audit trail. A scanner error aborts the chain and is returned as an
/// error, never downgraded to `allow`. Audit failures are logged and never
/// reach the caller. Budget store failures always do.
///
/// # Example
///
/// ```rust,no_run
/// use warden_core::{Warden, WardenConfig};
/// use warden_policy::ScanContext;
///
/// # async fn run() -> warden_core::Result<()> {
/// let warden = Warden::builder(WardenConfig::default()).build().await?;
///
/// let result = warden.scan("What is the weather today?", &ScanContext::new())?;
/// if result.safe {
///     // forward to the model provider
/// }
///
/// warden.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Warden {
    /// Configuration.
    config: WardenConfig,

    /// Preset applied when the context names none.
    preset: PresetName,

    /// One chain per preset, so a context may select a stricter preset.
    chains: HashMap<PresetName, ScannerChain>,

    /// Pins known to the tool policy scanners, keyed by server id.
    pins: HashMap<String, ToolManifestPin>,

    pin_store: Option<PinStore>,

    cost: Option<CostTracker>,

    audit: Option<Arc<AuditLogger>>,

    /// Audit writes still in flight, awaited by `close`.
    pending: Mutex<Vec<JoinHandle<()>>>,

    cache: Option<Mutex<ScanCache<ScanResult>>>,

    runtime: Option<Handle>,
}

/// Builder for [`Warden`] with injectable stores.
pub struct WardenBuilder {
    config: WardenConfig,
    budget_store: Option<Arc<dyn BudgetStore>>,
    audit_store: Option<Arc<dyn AuditStore>>,
}

impl WardenBuilder {
    /// Use this budget store instead of the configured one.
    #[must_use]
    pub fn with_budget_store(mut self, store: Arc<dyn BudgetStore>) -> Self {
        self.budget_store = Some(store);
        self
    }

    /// Use this audit sink instead of the configured one.
    #[must_use]
    pub fn with_audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(store);
        self
    }

    /// Validate the configuration and construct every component.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid (unknown preset, bad thresholds...)
    /// - A custom pattern does not compile
    /// - A manifest pin is malformed
    /// - The pin database or the Redis budget store cannot be opened
    pub async fn build(self) -> Result<Warden> {
        let WardenBuilder {
            config,
            budget_store,
            audit_store,
        } = self;
        config.validate()?;
        let preset = config.preset_name()?;

        let pin_store = match &config.tools.pin_db_path {
            Some(path) => Some(PinStore::open(path)?),
            None => None,
        };

        let mut pins: HashMap<String, ToolManifestPin> = config
            .tools
            .pins
            .iter()
            .map(|pin| (pin.server_id.clone(), pin.clone()))
            .collect();
        if let Some(store) = &pin_store {
            for pin in store.list_pins()? {
                pins.insert(pin.server_id.clone(), pin);
            }
        }

        let chains = build_chains(&config, &pins)?;

        let cost = if config.cost.enabled {
            let store = match budget_store {
                Some(store) => store,
                None => connect_budget_store(&config).await?,
            };
            Some(build_tracker(&config, preset, store)?)
        } else {
            None
        };

        let audit = if config.audit.enabled {
            let store = audit_store.unwrap_or_else(|| default_audit_store(&config));
            Some(Arc::new(AuditLogger::new(
                store,
                AuditLoggerConfig::default()
                    .with_batch_size(config.audit.batch_size)
                    .with_flush_interval(config.audit.flush_interval()),
            )))
        } else {
            None
        };

        let cache = config
            .cache
            .enabled
            .then(|| Mutex::new(ScanCache::new(config.cache.max_size, config.cache.ttl())));

        info!(
            preset = %preset,
            pins = pins.len(),
            cost = cost.is_some(),
            audit = audit.is_some(),
            cache = cache.is_some(),
            "Warden initialized"
        );

        Ok(Warden {
            config,
            preset,
            chains,
            pins,
            pin_store,
            cost,
            audit,
            pending: Mutex::new(Vec::new()),
            cache,
            runtime: Handle::try_current().ok(),
        })
    }
}

impl Warden {
    /// Start building a Warden from a configuration.
    pub fn builder(config: WardenConfig) -> WardenBuilder {
        WardenBuilder {
            config,
            budget_store: None,
            audit_store: None,
        }
    }

    /// Build with the configured stores.
    pub async fn new(config: WardenConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    /// Scan outbound content before it reaches the model.
    ///
    /// `block` is a normal result, not an error.
    pub fn scan(&self, input: &str, context: &ScanContext) -> Result<ScanResult> {
        self.scan_with_extras(input, context, AuditExtras::default())
    }

    /// Scan and attach caller-known details (model, cost...) to the audit
    /// record.
    pub fn scan_with_extras(
        &self,
        input: &str,
        context: &ScanContext,
        extras: AuditExtras,
    ) -> Result<ScanResult> {
        let mut context = context.clone();
        let preset = match &context.preset {
            Some(name) => PresetName::from_str(name)?,
            None => self.preset,
        };
        context
            .preset
            .get_or_insert_with(|| preset.as_str().to_string());

        let key = self.cache.as_ref().map(|_| fingerprint(input, preset, &context));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            let hit = cache.lock().unwrap_or_else(PoisonError::into_inner).get(key);
            if let Some(mut result) = hit {
                result.metadata.cached = true;
                debug!(decision = %result.decision, "scan served from cache");
                self.spawn_audit(input, &result, &context, extras);
                return Ok(result);
            }
        }

        let chain = self
            .chains
            .get(&preset)
            .ok_or_else(|| WardenError::Config(format!("no chain for preset {preset}")))?;
        let result = chain.run(input, &context)?;

        if result.is_blocked() {
            warn!(
                preset = %preset,
                violations = result.violations.len(),
                agent = context.agent_id.as_deref().unwrap_or("-"),
                "request blocked"
            );
        } else {
            debug!(preset = %preset, decision = %result.decision, "scan complete");
        }

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .set(key, result.clone());
        }

        self.spawn_audit(input, &result, &context, extras);
        Ok(result)
    }

    /// Check whether a call fits the entity's budget. Always allowed when
    /// cost tracking is disabled.
    pub async fn check_budget(
        &self,
        entity_id: &str,
        model: &str,
        est_input_tokens: u64,
        est_output_tokens: Option<u64>,
    ) -> Result<BudgetCheck> {
        match &self.cost {
            Some(tracker) => Ok(tracker
                .check_budget(entity_id, model, est_input_tokens, est_output_tokens)
                .await?),
            None => Ok(BudgetCheck {
                allowed: true,
                current_spend: 0.0,
                remaining_budget: f64::INFINITY,
                warning: None,
            }),
        }
    }

    /// Record actual spend. `None` when cost tracking is disabled.
    pub async fn record_cost(
        &self,
        entity_id: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<Option<CostRecord>> {
        match &self.cost {
            Some(tracker) => Ok(Some(
                tracker
                    .record_cost(entity_id, model, input_tokens, output_tokens)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    /// Current-period spend. Zero when cost tracking is disabled.
    pub async fn current_spend(&self, entity_id: &str) -> Result<f64> {
        match &self.cost {
            Some(tracker) => Ok(tracker.current_spend(entity_id).await?),
            None => Ok(0.0),
        }
    }

    /// Pin a server's tool surface, persist it when a pin store is
    /// configured, and enforce it from the next scan on.
    pub fn pin_manifest<S: AsRef<str>>(&mut self, server_id: &str, names: &[S]) -> Result<ToolManifestPin> {
        let pin = pin_manifest(server_id, names)?;
        if let Some(store) = &self.pin_store {
            store.store_pin(&pin)?;
        }
        self.pins.insert(pin.server_id.clone(), pin.clone());
        self.chains = build_chains(&self.config, &self.pins)?;
        // cached results were computed against the old pins
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
        info!(server = %server_id, tools = pin.tool_count, "manifest pinned");
        Ok(pin)
    }

    /// Remove expired cache entries. Returns how many were removed.
    pub fn prune_cache(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).prune())
            .unwrap_or(0)
    }

    /// Entries currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Wait for in-flight audit writes, flush and close the audit logger,
    /// and flush the pin store.
    pub async fn close(&self) -> Result<()> {
        let pending =
            std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "audit task failed");
            }
        }
        if let Some(audit) = &self.audit {
            audit.close().await;
        }
        if let Some(store) = &self.pin_store {
            store.flush()?;
        }
        info!("Warden closed");
        Ok(())
    }

    /// Default preset.
    pub fn preset(&self) -> PresetName {
        self.preset
    }

    /// Preset defaults for the default preset.
    pub fn policy(&self) -> PolicyEngine {
        PolicyEngine::from_name(self.preset)
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    /// Scanner names of a preset's chain, in run order.
    pub fn scanner_names(&self, preset: PresetName) -> Vec<String> {
        self.chains
            .get(&preset)
            .map(ScannerChain::scanner_names)
            .unwrap_or_default()
    }

    pub fn pin(&self, server_id: &str) -> Option<&ToolManifestPin> {
        self.pins.get(server_id)
    }

    pub fn cost_tracker(&self) -> Option<&CostTracker> {
        self.cost.as_ref()
    }

    /// Hand the record to the audit logger without blocking the caller.
    fn spawn_audit(&self, input: &str, result: &ScanResult, context: &ScanContext, extras: AuditExtras) {
        let (Some(logger), Some(runtime)) = (&self.audit, &self.runtime) else {
            return;
        };
        let logger = Arc::clone(logger);
        let input = input.to_string();
        let result = result.clone();
        let context = context.clone();
        let handle = runtime.spawn(async move {
            logger.log(&input, &result, &context, extras).await;
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

impl std::fmt::Debug for Warden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden")
            .field("preset", &self.preset)
            .field("pins", &self.pins.len())
            .field("cost", &self.cost.is_some())
            .field("audit", &self.audit.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

/// Cache key over everything that can change a scan result.
///
/// Every field is length-prefixed and optional fields carry a presence tag,
/// so no two distinct contexts share an encoding.
fn fingerprint(input: &str, preset: PresetName, context: &ScanContext) -> String {
    fn field(hasher: &mut Sha256, value: &str) {
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    fn optional(hasher: &mut Sha256, value: Option<&str>) {
        match value {
            Some(value) => {
                hasher.update([1]);
                field(hasher, value);
            }
            None => hasher.update([0]),
        }
    }

    let mut hasher = Sha256::new();
    field(&mut hasher, input);
    field(&mut hasher, preset.as_str());
    optional(&mut hasher, context.agent_id.as_deref());
    hasher.update((context.tools.len() as u64).to_le_bytes());
    for tool in &context.tools {
        field(&mut hasher, &tool.name);
        optional(&mut hasher, tool.server_id.as_deref());
    }
    hex::encode(hasher.finalize())
}

fn build_chains(
    config: &WardenConfig,
    pins: &HashMap<String, ToolManifestPin>,
) -> Result<HashMap<PresetName, ScannerChain>> {
    PresetName::ALL
        .iter()
        .map(|&name| -> Result<(PresetName, ScannerChain)> {
            Ok((name, build_chain(config, PolicyEngine::from_name(name), pins)?))
        })
        .collect()
}

/// Wire the scanners for one preset. Explicit settings override preset
/// defaults.
fn build_chain(
    config: &WardenConfig,
    policy: PolicyEngine,
    pins: &HashMap<String, ToolManifestPin>,
) -> Result<ScannerChain> {
    let mut chain = ScannerChain::new().with_early_exit(config.early_exit);

    if config.injection.enabled {
        let mut heuristic = HeuristicConfig::default().with_action(policy.injection_action());
        heuristic = match (config.injection.threshold, config.injection.strictness) {
            (Some(threshold), _) => heuristic.with_threshold(threshold),
            (None, Some(strictness)) => heuristic.with_strictness(strictness),
            (None, None) => heuristic.with_threshold(policy.injection_threshold()),
        };
        heuristic = config
            .injection
            .custom_patterns
            .iter()
            .cloned()
            .fold(heuristic, |c, rule: CustomRule| c.with_custom_rule(rule));
        chain = chain.with_scanner(HeuristicScanner::new(heuristic)?);
    }

    if config.pii.enabled {
        let mut pii = PiiConfig::default().with_default_action(
            config
                .pii
                .default_action
                .unwrap_or_else(|| policy.pii_action(None)),
        );
        for (&pii_type, &action) in policy.pii_actions().iter().chain(&config.pii.actions) {
            pii = pii.with_action(pii_type, action);
        }
        for &pii_type in &config.pii.allow_list {
            pii = pii.allow(pii_type);
        }
        chain = chain.with_scanner(PiiScanner::new(pii)?);
    }

    if config.tools.enabled {
        let mut tools = ToolPolicyConfig::default()
            .with_max_chain_depth(
                config
                    .tools
                    .max_chain_depth
                    .unwrap_or_else(|| policy.max_chain_depth()),
            )
            .with_read_only(config.tools.read_only);
        for pattern in policy.dangerous_patterns().iter().chain(&config.tools.dangerous_patterns) {
            if !tools.dangerous_patterns.contains(pattern) {
                tools = tools.with_dangerous_pattern(pattern.clone());
            }
        }
        for (agent, permissions) in &config.tools.agents {
            tools = tools.with_agent(agent.clone(), permissions.clone());
        }
        for pin in pins.values() {
            tools = tools.with_pin(pin.clone());
        }
        chain = chain.with_scanner(ToolPolicyScanner::new(tools)?);
    }

    Ok(chain)
}

async fn connect_budget_store(config: &WardenConfig) -> Result<Arc<dyn BudgetStore>> {
    match &config.cost.store_url {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(
            warden_monitor::RedisBudgetStore::connect(url).await?,
        )),
        #[cfg(not(feature = "redis"))]
        Some(_) => Err(WardenError::Config(
            "cost.store_url requires the `redis` feature".into(),
        )),
        None => Ok(Arc::new(MemoryBudgetStore::new())),
    }
}

fn build_tracker(
    config: &WardenConfig,
    preset: PresetName,
    store: Arc<dyn BudgetStore>,
) -> Result<CostTracker> {
    let mut tracker = CostTracker::new(store)
        .with_pricing(PricingTable::new().with_overrides(&config.cost.pricing));
    if let Some(capacity) = config.cost.record_log_capacity {
        tracker = tracker.with_record_log_capacity(capacity);
    }
    for (entity, budget) in &config.cost.budgets {
        tracker = tracker.with_budget(entity.clone(), *budget)?;
    }

    if config.cost.apply_preset_budget && !config.cost.budgets.contains_key(GLOBAL_ENTITY) {
        let policy = PolicyEngine::from_name(preset);
        let daily = policy.daily_budget();
        tracker = tracker.with_budget(
            GLOBAL_ENTITY,
            BudgetConfig::daily(daily).with_soft_limit(daily * policy.budget_warn_pct()),
        )?;
    }
    Ok(tracker)
}

fn default_audit_store(config: &WardenConfig) -> Arc<dyn AuditStore> {
    match config.audit.store {
        AuditStoreKind::Console => Arc::new(ConsoleAuditStore::new()),
        AuditStoreKind::Memory => {
            let store = MemoryAuditStore::new();
            Arc::new(match config.audit.retention_days {
                Some(days) => store.with_retention_days(days),
                None => store,
            })
        }
    }
}
