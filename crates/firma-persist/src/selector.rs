use std::{collections::HashMap, sync::Arc};

use firma_types::{
    config::{DeploymentVariant, PersistenceConfig, StrategyKind},
    diagnostic::Diagnostic,
    environment::Environment,
    image::SignatureImage,
};
use tracing::{info, warn};

use crate::strategy::{PersistStrategy, SaveReceipt};

/// Ordered save plan for one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistencePolicy {
    pub strategies: Vec<StrategyKind>,
    /// Skip strategies the capability snapshot already rules out.
    pub precheck: bool,
    /// Show failure reasons; otherwise only a generic failure notice.
    pub surface_diagnostics: bool,
}

impl PersistencePolicy {
    pub fn from_variant(variant: DeploymentVariant) -> Self {
        Self {
            strategies: variant.strategies(),
            precheck: variant.prechecks(),
            surface_diagnostics: variant.surfaces_diagnostics(),
        }
    }

    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self {
            strategies: config.effective_strategies(),
            ..Self::from_variant(config.variant)
        }
    }
}

/// One strategy that did not save the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub kind: StrategyKind,
    pub diagnostic: Diagnostic,
    /// False when the precheck skipped the strategy.
    pub invoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResolution {
    Saved {
        receipt: SaveReceipt,
        /// Why earlier strategies were passed over; `None` when the first
        /// strategy worked or the policy hides reasons.
        fallback_reason: Option<Diagnostic>,
        failures: Vec<Attempt>,
    },
    Failed {
        /// `None` when the policy hides reasons.
        reason: Option<Diagnostic>,
        failures: Vec<Attempt>,
    },
}

/// Runs the policy's strategies in order until one of them saves.
pub struct StrategySelector {
    policy: PersistencePolicy,
    strategies: HashMap<StrategyKind, Arc<dyn PersistStrategy>>,
}

impl StrategySelector {
    pub fn new(policy: PersistencePolicy) -> Self {
        Self {
            policy,
            strategies: HashMap::new(),
        }
    }

    pub fn register(mut self, strategy: Arc<dyn PersistStrategy>) -> Self {
        self.strategies.insert(strategy.kind(), strategy);
        self
    }

    pub fn policy(&self) -> &PersistencePolicy {
        &self.policy
    }

    /// Reason reported when every strategy has failed (or for an encoding
    /// failure before any of them ran), honouring the diagnostics setting.
    pub fn visible(&self, diagnostic: Diagnostic) -> Option<Diagnostic> {
        self.policy.surface_diagnostics.then_some(diagnostic)
    }

    pub async fn save(
        &self,
        image: &SignatureImage,
        file_name: &str,
        env: &Environment,
    ) -> SaveResolution {
        let mut failures = Vec::new();

        for kind in &self.policy.strategies {
            let Some(strategy) = self.strategies.get(kind) else {
                warn!("Strategy {} is not available on this platform", kind.label());
                failures.push(Attempt {
                    kind: *kind,
                    diagnostic: unavailable(*kind),
                    invoked: false,
                });
                continue;
            };

            if self.policy.precheck {
                if let Some(diagnostic) = strategy.precheck(env) {
                    info!("Skipping {} strategy: {diagnostic}", kind.label());
                    failures.push(Attempt {
                        kind: *kind,
                        diagnostic,
                        invoked: false,
                    });
                    continue;
                }
            }

            match strategy.persist(image, file_name, env).await {
                Ok(receipt) => {
                    info!("Saved {file_name} via {}", kind.label());
                    let fallback_reason = most_specific(&failures).and_then(|d| self.visible(d));
                    return SaveResolution::Saved {
                        receipt,
                        fallback_reason,
                        failures,
                    };
                }
                Err(err) => {
                    let diagnostic = err.diagnostic().unwrap_or(Diagnostic::WriteFailed);
                    warn!("{} strategy failed: {err}", kind.label());
                    failures.push(Attempt {
                        kind: *kind,
                        diagnostic,
                        invoked: true,
                    });
                }
            }
        }

        let reason = most_specific(&failures)
            .or(Some(Diagnostic::WriteFailed))
            .and_then(|d| self.visible(d));
        SaveResolution::Failed { reason, failures }
    }
}

fn unavailable(kind: StrategyKind) -> Diagnostic {
    match kind {
        StrategyKind::Silent => Diagnostic::NoStorage,
        StrategyKind::Directory => Diagnostic::NoDirectoryCapability,
        StrategyKind::Download => Diagnostic::WriteFailed,
    }
}

/// The earliest of the most telling reasons.
fn most_specific(failures: &[Attempt]) -> Option<Diagnostic> {
    failures
        .iter()
        .map(|a| a.diagnostic)
        .reduce(|best, d| {
            if d.specificity() > best.specificity() {
                d
            } else {
                best
            }
        })
}
