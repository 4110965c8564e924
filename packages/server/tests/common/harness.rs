//! Test harnesses for integration testing.
//!
//! `TestHarness` runs activities against the in-memory store and the spy
//! transports from `kernel::test_dependencies`. It needs no containers and is
//! what most suites use.
//!
//! `PostgresHarness` talks to a real database. The container is started once
//! and shared by every test in the binary, and migrations run once. Tests
//! using it are `#[ignore]`d so a plain `cargo test` stays container-free:
//!   cargo test -- --ignored

use std::sync::Arc;

use adoption_core::kernel::{
    EntityStore, JobRegistry, MemoryStore, PostgresJobQueue, PostgresStore, ServerDeps,
    TestDependencies,
};
use adoption_core::server::build_registry;
use anyhow::{Context, Result};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-memory harness
// =============================================================================

/// Activities wired to a `MemoryStore` and spy transports.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let world = World::seed(ctx, PetStatus::Available).await;
///     // ... call activities with &ctx.deps
///     ctx.settle().await;
/// }
/// ```
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub mocks: TestDependencies,
    pub deps: ServerDeps,
    pub registry: JobRegistry,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        self.deps.drain_background().await;
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_mocks(TestDependencies::new())
    }

    /// Harness over custom mocks, e.g. a failing mailer.
    pub fn with_mocks(mocks: TestDependencies) -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        let deps = mocks.into_deps(store.clone());
        let registry = build_registry(&deps);

        Self {
            store,
            mocks,
            deps,
            registry,
        }
    }

    /// Wait for background side effects, then run queued jobs, until both
    /// are quiet.
    pub async fn settle(&self) {
        loop {
            self.deps.drain_background().await;
            if self.mocks.jobs.run_pending(&self.registry).await == 0 {
                break;
            }
        }
    }

    /// Flush background tasks without running jobs.
    pub async fn drain(&self) {
        self.deps.drain_background().await;
    }
}

// =============================================================================
// Postgres harness
// =============================================================================

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Activities wired to `PostgresStore` and the Postgres job queue.
///
/// Transports are still the spies; only persistence is real.
pub struct PostgresHarness {
    pub db_pool: PgPool,
    pub store: Arc<PostgresStore>,
    pub queue: Arc<PostgresJobQueue>,
    pub mocks: TestDependencies,
    pub deps: ServerDeps,
}

impl AsyncTestContext for PostgresHarness {
    async fn setup() -> Self {
        Self::new()
            .await
            .expect("Failed to create postgres test harness")
    }

    async fn teardown(self) {
        self.deps.drain_background().await;
    }
}

impl PostgresHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;

        let store = Arc::new(PostgresStore::new(db_pool.clone()));
        let queue = Arc::new(PostgresJobQueue::new(db_pool.clone()));
        let mocks = TestDependencies::new();
        let mut deps = mocks.into_deps(store.clone() as Arc<dyn EntityStore>);
        deps.jobs = queue.clone();

        Ok(Self {
            db_pool,
            store,
            queue,
            mocks,
            deps,
        })
    }
}
