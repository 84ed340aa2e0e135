use std::{collections::BTreeMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    admin::Admin,
    config::SerialBoxConfig,
    discovery::{Discovery, RegionRegistry, RegionVariant},
    escalation::{Allocation, Escalator, ExecutorRegistry, RuleExecutor},
    generator::{AllocationRequest, Generator, SequentialGenerator, active_pool},
    model::{ContentType, RegionRef, Response, SEQUENTIAL_KIND},
    rules::{PostRule, PreRule, RequestContext, RuleDeps, RulePipeline, RuleRegistry},
    store::{MemoryStore, Reader, Store},
};

/// What a generator factory may use to build its generator.
pub struct GeneratorDeps<'a> {
    pub discovery: Arc<Discovery>,
    config: &'a SerialBoxConfig,
    rules: &'a RuleRegistry,
}

impl GeneratorDeps<'_> {
    /// Loads the rule pipeline configured for `generator`.
    ///
    /// # Errors
    /// - [`Error::UnknownRule`] for an unregistered identifier.
    pub fn pipeline(&self, generator: &str) -> Result<RulePipeline> {
        let deps = RuleDeps {
            discovery: Arc::clone(&self.discovery),
        };
        RulePipeline::load(&self.config.rules, self.rules, generator, &deps)
    }
}

type GeneratorFactory =
    Box<dyn FnOnce(&GeneratorDeps<'_>) -> Result<Arc<dyn Generator>> + Send + Sync>;

/// Assembles a [`SerialBox`].
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use serialbox::{SerialBox, SerialBoxConfig, store::MemoryStore};
///
/// let serialbox = SerialBox::builder()
///     .store(Arc::new(MemoryStore::new()))
///     .config(SerialBoxConfig::default())
///     .build()
///     .unwrap();
///
/// assert!(serialbox.admin().list_pools().unwrap().is_empty());
/// ```
#[must_use]
pub struct SerialBoxBuilder {
    store: Option<Arc<dyn Store>>,
    config: SerialBoxConfig,
    rules: RuleRegistry,
    variants: Vec<(Arc<dyn RegionVariant>, GeneratorFactory)>,
    executors: ExecutorRegistry,
}

impl Default for SerialBoxBuilder {
    fn default() -> Self {
        Self {
            store: None,
            config: SerialBoxConfig::default(),
            rules: RuleRegistry::default(),
            variants: Vec::new(),
            executors: ExecutorRegistry::default(),
        }
    }
}

impl SerialBoxBuilder {
    /// Defaults to a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: SerialBoxConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the rule registry. The default knows the built-in rules.
    pub fn rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn pre_rule<F>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&RuleDeps) -> Arc<dyn PreRule> + Send + Sync + 'static,
    {
        self.rules.register_pre(identifier, factory);
        self
    }

    pub fn post_rule<F>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&RuleDeps) -> Arc<dyn PostRule> + Send + Sync + 'static,
    {
        self.rules.register_post(identifier, factory);
        self
    }

    /// Registers a region variant and the generator serving its regions.
    pub fn variant<F>(mut self, variant: Arc<dyn RegionVariant>, factory: F) -> Self
    where
        F: FnOnce(&GeneratorDeps<'_>) -> Result<Arc<dyn Generator>> + Send + Sync + 'static,
    {
        self.variants.push((variant, Box::new(factory)));
        self
    }

    /// Registers the executor of a response rule.
    pub fn executor(mut self, rule: impl Into<String>, executor: Arc<dyn RuleExecutor>) -> Self {
        self.executors.register(rule, executor);
        self
    }

    /// # Errors
    /// - [`Error::UnknownRule`] if the rule configuration names an
    ///   unregistered rule under any key.
    /// - [`Error::Duplicate`] if two variants share a kind.
    pub fn build(self) -> Result<SerialBox> {
        let Self {
            store,
            config,
            rules,
            variants,
            executors,
        } = self;
        rules.check(&config.rules)?;

        let store = store.unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>);
        let mut registry = RegionRegistry::default();
        for (variant, _) in &variants {
            registry.register(Arc::clone(variant))?;
        }
        let discovery = Arc::new(Discovery::new(Arc::clone(&store), registry));

        let deps = GeneratorDeps {
            discovery: Arc::clone(&discovery),
            config: &config,
            rules: &rules,
        };
        let mut generators: BTreeMap<String, Arc<dyn Generator>> = BTreeMap::new();
        generators.insert(
            SEQUENTIAL_KIND.to_owned(),
            Arc::new(SequentialGenerator::new(
                Arc::clone(&discovery),
                deps.pipeline(SequentialGenerator::NAME)?,
            )),
        );
        for (variant, factory) in variants {
            generators.insert(variant.kind().to_owned(), factory(&deps)?);
        }

        let admin = Admin::new(
            Arc::clone(&store),
            config.overlap_check,
            config.default_request_threshold,
        );
        let escalator = Escalator::new(Arc::clone(&store), executors);

        Ok(SerialBox {
            config,
            store,
            discovery,
            generators,
            admin,
            escalator,
        })
    }
}

/// The allocation service.
///
/// Resolves the generator that serves a request, runs it, and applies any
/// configured response rule to the outcome.
pub struct SerialBox {
    config: SerialBoxConfig,
    store: Arc<dyn Store>,
    discovery: Arc<Discovery>,
    generators: BTreeMap<String, Arc<dyn Generator>>,
    admin: Admin,
    escalator: Escalator,
}

impl core::fmt::Debug for SerialBox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialBox")
            .field("config", &self.config)
            .field("discovery", &self.discovery)
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("escalator", &self.escalator)
            .finish_non_exhaustive()
    }
}

impl SerialBox {
    pub fn builder() -> SerialBoxBuilder {
        SerialBoxBuilder::default()
    }

    /// An in-memory instance with the default configuration.
    ///
    /// # Errors
    /// Never with the built-in rules; see [`SerialBoxBuilder::build`].
    pub fn in_memory() -> Result<Self> {
        Self::builder().build()
    }

    pub fn config(&self) -> &SerialBoxConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    pub fn admin(&self) -> &Admin {
        &self.admin
    }

    pub fn escalator(&self) -> &Escalator {
        &self.escalator
    }

    /// The generator serving the next allocation from `pool`: the one
    /// registered for the kind of the pool's selected region.
    ///
    /// # Errors
    /// - [`Error::PoolNotFound`] if the pool is missing or inactive.
    /// - [`Error::NoActiveRegion`] if no region can serve it.
    pub fn resolve_generator(&self, pool: &str) -> Result<Arc<dyn Generator>> {
        active_pool(self.store.as_ref(), pool)?;
        let region = self.discovery.select_region(pool)?;
        self.generator_for(&region)
    }

    fn generator_for(&self, region: &RegionRef) -> Result<Arc<dyn Generator>> {
        self.generators
            .get(region.kind())
            .cloned()
            .ok_or_else(|| Error::UnknownRegionKind {
                kind: region.kind().to_owned(),
            })
    }

    fn generator_for_request(&self, request: &AllocationRequest) -> Result<Arc<dyn Generator>> {
        let Some(machine_name) = request.region.as_deref() else {
            return self.resolve_generator(&request.pool);
        };
        active_pool(self.store.as_ref(), &request.pool)?;
        let region = self
            .discovery
            .find_region(machine_name)?
            .filter(|region| region.pool() == request.pool)
            .ok_or_else(|| Error::RegionNotFound {
                machine_name: machine_name.to_owned(),
            })?;
        self.generator_for(&region)
    }

    /// Allocates numbers for `request`.
    ///
    /// # Errors
    /// See [`Generator::get_response`]; a zero size is rejected with
    /// [`Error::InvalidRequest`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pool = %request.pool, size = request.size, region = ?request.region))
    )]
    pub fn allocate(&self, ctx: &RequestContext, request: &AllocationRequest) -> Result<Response> {
        request.validate()?;
        loop {
            let generator = self.generator_for_request(request)?;
            #[cfg(feature = "tracing")]
            tracing::debug!(generator = generator.name(), "resolved generator");
            match generator.get_response(ctx, request) {
                Err(Error::Rerouted { .. }) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("selected region moved to another generator, resolving again");
                }
                outcome => return outcome,
            }
        }
    }

    /// Allocates numbers for a client that accepts `content_type`.
    ///
    /// If the pool has a response rule for `content_type`, the committed
    /// response is escalated to it and its output is returned as the
    /// payload. The numbers stay issued even when escalation fails.
    ///
    /// # Errors
    /// Those of [`SerialBox::allocate`], plus [`Error::Escalation`].
    pub fn allocate_for(
        &self,
        ctx: &RequestContext,
        request: &AllocationRequest,
        content_type: ContentType,
    ) -> Result<Allocation> {
        let response = self.allocate(ctx, request)?;
        match self.store.response_rule(&request.pool, content_type)? {
            Some(rule) => self.escalator.escalate(ctx, request, &rule, response),
            None => Ok(Allocation::plain(response)),
        }
    }
}
