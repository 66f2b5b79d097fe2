//! Request routing and batch execution
//!
//! Batches use Rayon for work-stealing parallelism, capped by
//! [`ParallelConfig::max_parallelism`]. Results come back in request order.

use crate::config::{ParallelConfig, VerifierConfig};
use crate::tools::{DispatchResult, ToolArguments, ToolRegistry};
use crate::verdict::Verdict;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One invocation in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Tool name or alias
    pub tool: String,
    /// JSON arguments object
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    /// Creates a request
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        ToolRequest {
            tool: tool.into(),
            arguments,
        }
    }
}

/// Stateless router from tool invocations to engines
pub struct Dispatcher {
    registry: ToolRegistry,
    parallel: ParallelConfig,
}

impl Dispatcher {
    /// Dispatcher over the standard tools
    pub fn new(config: VerifierConfig) -> Self {
        Dispatcher {
            registry: ToolRegistry::new(&config),
            parallel: config.parallel,
        }
    }

    /// Dispatcher over a custom registry
    pub fn with_registry(registry: ToolRegistry, parallel: ParallelConfig) -> Self {
        Dispatcher { registry, parallel }
    }

    /// The tool registry
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Route one invocation
    ///
    /// The argument object is checked against the tool's closed schema
    /// before the engine runs. Engine failures come back as `undetermined`
    /// verdicts; only malformed invocations are errors.
    pub fn invoke(&self, tool_name: &str, arguments: &Value) -> DispatchResult<Verdict> {
        let tool = self.registry.get(tool_name)?;
        let args = ToolArguments::from_value(arguments)?;
        args.check_fields(tool.accepted_fields())?;
        debug!(tool = tool.name(), requested = tool_name, "dispatch");

        let verdict = tool.invoke(&args)?;
        debug!(
            tool = tool.name(),
            valid = %verdict.valid(),
            confidence = verdict.confidence(),
            findings = verdict.findings().len(),
            "verdict"
        );
        Ok(verdict)
    }

    /// Route a batch of invocations, returning results in request order
    pub fn invoke_batch(&self, requests: &[ToolRequest]) -> Vec<DispatchResult<Verdict>> {
        // Empty batch fast path
        if requests.is_empty() {
            return Vec::new();
        }

        // Single request - no parallelism needed
        if requests.len() == 1 {
            return vec![self.invoke(&requests[0].tool, &requests[0].arguments)];
        }

        let threads = self.parallel.max_parallelism.clamp(1, requests.len());
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "failed to create thread pool, verifying sequentially");
                return requests
                    .iter()
                    .map(|r| self.invoke(&r.tool, &r.arguments))
                    .collect();
            }
        };

        debug!(requests = requests.len(), threads, "batch dispatch");
        pool.install(|| {
            requests
                .par_iter()
                .map(|r| self.invoke(&r.tool, &r.arguments))
                .collect()
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}
