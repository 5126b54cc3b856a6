use crate::{
    context::{TestContext, TestEnvironment, TestSettings},
    provider::{l1_config, l2_config, l2_provider},
    reporter::Reporter,
};
use alloy_signer_local::{LocalSignerError, PrivateKeySigner};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use testkit_wallet::{settle, sweep_back, Account, RpcProvider, SettleReport};
use tracing::{debug, info};

/// Segment of a suite path identifying the tests root.
///
/// Everything after its last occurrence names the suite, so nested suites keep their directory:
/// `ts-integration/tests/contracts/custom.test.ts` is `contracts/custom.test.ts`.
pub const SUITE_PATH_MARKER: &str = "ts-integration/tests/";

static INSTANCE: OnceCell<TestMaster> = OnceCell::new();

/// Errors raised while setting up the test session. All of them abort the suite.
#[derive(Debug, thiserror::Error)]
pub enum TestMasterError {
    #[error(
        "test context was not initialized; unable to load the ZKSYNC_JEST_TEST_CONTEXT \
         environment variable"
    )]
    MissingContext,
    #[error("failed to read the test settings from the environment: {0}")]
    Settings(#[from] envy::Error),
    #[error("malformed test context: {0}")]
    MalformedContext(#[from] serde_json::Error),
    #[error("received invalid test suite path: {0}")]
    InvalidSuitePath(String),
    #[error("wallet for {0} suite was not provided")]
    MissingWallet(String),
    #[error("wallet for {suite} suite is not a valid private key: {source}")]
    InvalidWallet {
        suite: String,
        #[source]
        source: LocalSignerError,
    },
    #[error("failed to build the network client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Resolves the suite name from the path of a suite file.
pub fn suite_name(suite_path: &str) -> Result<&str, TestMasterError> {
    suite_path
        .rfind(SUITE_PATH_MARKER)
        .map(|pos| &suite_path[pos + SUITE_PATH_MARKER.len()..])
        .ok_or_else(|| TestMasterError::InvalidSuitePath(suite_path.to_string()))
}

/// Per-process test session.
///
/// Loads the account funded for the running suite, creates empty accounts on demand and, once
/// the suite is done, collects the funds of those accounts back into the funded one.
///
/// There is exactly one session per process. It is created on first access through
/// [`TestMaster::get_instance`] or [`TestMaster::initialize`] and lives until the process exits.
#[derive(Debug)]
pub struct TestMaster {
    env: TestEnvironment,
    suite_name: String,
    fast_mode: bool,
    reporter: Reporter,
    l1: RpcProvider,
    l2: RpcProvider,
    main_account: Account,
    sub_accounts: Mutex<Vec<Account>>,
}

impl TestMaster {
    /// Returns the session, creating it for `suite_path` from the process environment if this is
    /// the first call. Later calls ignore `suite_path`.
    pub fn get_instance(suite_path: &str) -> Result<&'static Self, TestMasterError> {
        INSTANCE.get_or_try_init(|| {
            let settings = TestSettings::from_env()?;
            let raw = settings.raw_context().ok_or(TestMasterError::MissingContext)?;
            let context = TestContext::from_json(raw)?;
            Self::new(context, settings.is_fast_mode(), suite_path)
        })
    }

    /// Returns the session, creating it for `suite_path` from the given context if this is the
    /// first call. Later calls ignore all arguments.
    pub fn initialize(
        context: TestContext,
        fast_mode: bool,
        suite_path: &str,
    ) -> Result<&'static Self, TestMasterError> {
        INSTANCE.get_or_try_init(|| Self::new(context, fast_mode, suite_path))
    }

    /// The session, if one was created.
    pub fn current() -> Option<&'static Self> {
        INSTANCE.get()
    }

    fn new(
        context: TestContext,
        fast_mode: bool,
        suite_path: &str,
    ) -> Result<Self, TestMasterError> {
        let suite_name = suite_name(suite_path)?.to_string();
        let key = context
            .wallet_for(&suite_name)
            .ok_or_else(|| TestMasterError::MissingWallet(suite_name.clone()))?;
        let signer = key.trim().parse::<PrivateKeySigner>().map_err(|source| {
            TestMasterError::InvalidWallet { suite: suite_name.clone(), source }
        })?;

        let env = context.environment;
        let localhost = env.is_localhost();
        let reporter = Reporter::new(suite_name.as_str());

        let l1 = l1_config(env.l1_node_url.clone(), localhost).build()?;
        let l2 = l2_provider(l2_config(env.l2_node_url.clone(), localhost), &reporter)?;
        let main_account = Account::new(signer, l2.clone(), l1.clone());

        info!(
            target: "testkit::session",
            suite = %suite_name,
            network = %env.network,
            main_account = %main_account.address(),
            fast_mode,
            "test session initialized"
        );

        Ok(Self {
            env,
            suite_name,
            fast_mode,
            reporter,
            l1,
            l2,
            main_account,
            sub_accounts: Mutex::new(Vec::new()),
        })
    }

    /// The funded account exclusive to the suite.
    pub const fn main_account(&self) -> &Account {
        &self.main_account
    }

    /// Creates an account with a random key and no funds.
    ///
    /// Funds sent to it are collected back into [`Self::main_account`] by
    /// [`Self::deinitialize`].
    pub fn new_empty_account(&self) -> Account {
        let account = Account::random(self.l2.clone(), self.l1.clone());
        self.sub_accounts.lock().push(account.clone());
        debug!(target: "testkit::session", address = %account.address(), "created empty account");
        account
    }

    /// Accounts created with [`Self::new_empty_account`] so far.
    pub fn empty_accounts(&self) -> Vec<Account> {
        self.sub_accounts.lock().clone()
    }

    /// The network under test.
    pub const fn environment(&self) -> &TestEnvironment {
        &self.env
    }

    /// Suite the session was created for.
    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// Reporter scoped to the suite.
    pub const fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Base-layer client shared by every account of the session.
    pub const fn l1(&self) -> &RpcProvider {
        &self.l1
    }

    /// Rollup-layer client shared by every account of the session.
    pub const fn l2(&self) -> &RpcProvider {
        &self.l2
    }

    /// Whether the suite runs against a local deployment.
    pub fn is_local_host(&self) -> bool {
        self.env.is_localhost()
    }

    /// Whether the tests run in fast mode.
    ///
    /// The default mode includes tests that wait for block finalization; fast mode skips them,
    /// e.g. to quickly check a shared deployment.
    pub const fn is_fast_mode(&self) -> bool {
        self.fast_mode
    }

    /// Collects funds from every empty account back into the main account.
    ///
    /// Failures are reported and swallowed: recovering funds must not fail the suite.
    pub async fn deinitialize(&self) -> SettleReport {
        let accounts = self.empty_accounts();
        let action = self.reporter.start_action("Collecting funds from empty accounts");

        let report = settle(sweep_back(&accounts, self.main_account.address())).await;
        if report.is_clean() {
            action.finish();
        } else {
            action.fail(&format!("{} of {} sweeps failed", report.failed, accounts.len()));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use rstest::rstest;
    use std::collections::HashSet;

    const ERC20_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const NESTED_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn master(network: &str, suite_path: &str) -> Result<TestMaster, TestMasterError> {
        TestMaster::new(context(network), false, suite_path)
    }

    fn context(network: &str) -> TestContext {
        serde_json::from_value(serde_json::json!({
            "environment": {
                "network": network,
                "l1NodeUrl": "http://127.0.0.1:8545",
                "l2NodeUrl": "http://127.0.0.1:3050"
            },
            "wallets": {
                "erc20.test.ts": ERC20_KEY,
                "contracts/custom.test.ts": NESTED_KEY,
                "broken.test.ts": "0x1234"
            }
        }))
        .unwrap()
    }

    #[rstest]
    #[case("/repo/core/tests/ts-integration/tests/erc20.test.ts", "erc20.test.ts")]
    #[case("ts-integration/tests/contracts/custom.test.ts", "contracts/custom.test.ts")]
    #[case("/a/ts-integration/tests/b/ts-integration/tests/c.test.ts", "c.test.ts")]
    #[case("ts-integration/tests/", "")]
    fn test_suite_name(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(suite_name(path).unwrap(), expected);
    }

    #[rstest]
    #[case("erc20.test.ts")]
    #[case("/repo/core/tests/ts-integration/erc20.test.ts")]
    #[case("/repo/ts-integration/tests")]
    fn test_suite_name_requires_marker(#[case] path: &str) {
        let err = suite_name(path).unwrap_err();
        assert!(matches!(err, TestMasterError::InvalidSuitePath(p) if p == path));
    }

    #[test]
    fn test_resolves_suite_wallet() {
        let erc20 =
            master("localhost", "/repo/core/tests/ts-integration/tests/erc20.test.ts").unwrap();
        assert_eq!(erc20.suite_name(), "erc20.test.ts");
        assert_eq!(erc20.main_account().private_key(), ERC20_KEY.parse::<B256>().unwrap());
        assert_eq!(erc20.reporter().suite(), "erc20.test.ts");

        let nested = master("localhost", "ts-integration/tests/contracts/custom.test.ts").unwrap();
        assert_eq!(nested.main_account().private_key(), NESTED_KEY.parse::<B256>().unwrap());
    }

    #[test]
    fn test_construction_errors() {
        let err = master("localhost", "/repo/erc20.test.ts").unwrap_err();
        assert!(matches!(err, TestMasterError::InvalidSuitePath(_)));

        let err = master("localhost", "ts-integration/tests/missing.test.ts").unwrap_err();
        assert!(matches!(err, TestMasterError::MissingWallet(suite) if suite == "missing.test.ts"));

        let err = master("localhost", "ts-integration/tests/broken.test.ts").unwrap_err();
        assert!(
            matches!(err, TestMasterError::InvalidWallet { suite, .. } if suite == "broken.test.ts")
        );
    }

    #[rstest]
    #[case("localhost", true)]
    #[case("stage2", false)]
    #[case("LOCALHOST", false)]
    fn test_flags(#[case] network: &str, #[case] localhost: bool) {
        let master =
            TestMaster::new(context(network), true, "ts-integration/tests/erc20.test.ts").unwrap();
        assert_eq!(master.is_local_host(), localhost);
        assert!(master.is_fast_mode());
        assert_eq!(master.environment().network, network);
    }

    #[test]
    fn test_empty_accounts_are_distinct_and_tracked() {
        let master = master("localhost", "ts-integration/tests/erc20.test.ts").unwrap();

        let created: Vec<_> = (0..5).map(|_| master.new_empty_account().address()).collect();
        let unique: HashSet<_> = created.iter().copied().collect();
        assert_eq!(unique.len(), 5);
        assert!(!unique.contains(&master.main_account().address()));

        let tracked: Vec<_> =
            master.empty_accounts().iter().map(|account| account.address()).collect();
        assert_eq!(tracked, created);
    }

    #[tokio::test]
    async fn test_deinitialize_without_accounts() {
        let master = master("localhost", "ts-integration/tests/erc20.test.ts").unwrap();
        assert_eq!(master.deinitialize().await, SettleReport::default());
    }

    #[tokio::test]
    async fn test_deinitialize_reports_unreachable_node() {
        let mut context = context("localhost");
        // nothing listens on this port
        context.environment.l2_node_url = "http://127.0.0.1:1".parse().unwrap();
        let master = TestMaster::new(context, false, "ts-integration/tests/erc20.test.ts").unwrap();
        for _ in 0..3 {
            master.new_empty_account();
        }

        let report = master.deinitialize().await;
        assert_eq!(report, SettleReport { swept: 0, skipped: 0, failed: 3 });
        assert!(!report.is_clean());
    }
}
