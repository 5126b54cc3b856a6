//! Test context handed to every suite by the process that prepared the network.

use alloy_primitives::{Address, U256};
use serde::Deserialize;
use std::{collections::BTreeMap, ffi::OsString};
use url::Url;

/// Environment variable carrying the JSON encoded [`TestContext`].
pub const CONTEXT_ENV: &str = "ZKSYNC_JEST_TEST_CONTEXT";

/// Environment variable enabling the fast test mode when set to exactly `true`.
pub const FAST_MODE_ENV: &str = "ZK_INTEGRATION_TESTS_FAST_MODE";

/// Network name of a locally running deployment.
const LOCALHOST: &str = "localhost";

/// Everything a suite needs to connect to the network under test.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestContext {
    /// Description of the network.
    pub environment: TestEnvironment,
    /// Funded private keys, keyed by the suite path relative to the tests root.
    #[serde(default)]
    pub wallets: BTreeMap<String, String>,
}

impl TestContext {
    /// Parses the serialized context.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Private key funded for the given suite, if any.
    pub fn wallet_for(&self, suite_name: &str) -> Option<&str> {
        self.wallets.get(suite_name).map(String::as_str).filter(|key| !key.is_empty())
    }
}

/// Network the tests run against.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEnvironment {
    /// Network name, `localhost` for a local deployment.
    pub network: String,
    /// Base-layer JSON-RPC endpoint.
    pub l1_node_url: Url,
    /// Rollup-layer JSON-RPC endpoint.
    pub l2_node_url: Url,
    /// Rollup-layer websocket endpoint.
    #[serde(default)]
    pub ws_l2_node_url: Option<Url>,
    /// Rollup chain id.
    #[serde(default, deserialize_with = "big_int::deserialize_opt")]
    pub l2_chain_id: Option<u64>,
    /// Private key of the account that funded the suites.
    #[serde(default, rename = "mainWalletPK")]
    pub main_wallet_pk: Option<String>,
    /// Root of the repository the tests were started from.
    #[serde(default)]
    pub path_to_home: Option<String>,
    /// Token gas is paid in.
    #[serde(default)]
    pub base_token: Option<Token>,
    /// Minimal gas price accepted by the sequencer.
    #[serde(default, deserialize_with = "big_int::deserialize_opt")]
    pub minimal_l2_gas_price: Option<U256>,
    /// Gas limit of priority (L1 -> L2) transactions.
    #[serde(default, deserialize_with = "big_int::deserialize_opt")]
    pub priority_tx_max_gas_limit: Option<U256>,
    /// Computational gas limit of account validation.
    #[serde(default, deserialize_with = "big_int::deserialize_opt")]
    pub validation_computational_gas_limit: Option<u64>,
    /// Maximum number of logs returned by `eth_getLogs`.
    #[serde(default, deserialize_with = "big_int::deserialize_opt")]
    pub max_logs_limit: Option<u64>,
    /// Remaining keys, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TestEnvironment {
    /// Whether the network name is exactly `localhost`.
    pub fn is_localhost(&self) -> bool {
        self.network == LOCALHOST
    }
}

/// ERC-20 style token description.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Token name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Decimals.
    #[serde(deserialize_with = "big_int::deserialize")]
    pub decimals: u8,
    /// Address on the base layer.
    pub l1_address: Address,
    /// Address on the rollup, if already bridged.
    #[serde(default)]
    pub l2_address: Option<Address>,
}

/// Process environment consumed by a test session, see [`CONTEXT_ENV`] and [`FAST_MODE_ENV`].
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TestSettings {
    /// Serialized [`TestContext`].
    #[serde(default, rename = "zksync_jest_test_context")]
    pub context: Option<String>,
    /// Raw fast mode flag.
    #[serde(default, rename = "zk_integration_tests_fast_mode")]
    pub fast_mode: Option<String>,
}

impl TestSettings {
    /// Reads the settings from the process environment.
    ///
    /// Only [`CONTEXT_ENV`] and [`FAST_MODE_ENV`] are inspected, so unrelated variables holding
    /// non UTF-8 data are ignored.
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Reads the settings from raw `(name, value)` pairs, keeping the known variables.
    pub fn from_os_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut known = Vec::new();
        for (name, value) in vars {
            let Some(name) = name.to_str() else { continue };
            if !matches!(name, CONTEXT_ENV | FAST_MODE_ENV) {
                continue;
            }
            let value = value.into_string().map_err(|_| {
                envy::Error::Custom(format!("environment variable {name} is not valid UTF-8"))
            })?;
            known.push((name.to_string(), value));
        }
        Self::from_vars(known)
    }

    /// Reads the settings from `(name, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Whether the fast mode flag is set to exactly `true`.
    ///
    /// The default mode includes tests that wait for block finalization.
    pub fn is_fast_mode(&self) -> bool {
        self.fast_mode.as_deref() == Some("true")
    }

    /// The serialized context, if present and non-empty.
    pub fn raw_context(&self) -> Option<&str> {
        self.context.as_deref().filter(|context| !context.is_empty())
    }
}

/// Integers that may not fit a JSON number.
///
/// Accepts plain JSON integers, decimal strings, decimal strings with the `n` suffix used for
/// serialized big integers, and `0x` prefixed hex strings.
mod big_int {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    pub(super) fn parse(text: &str) -> Result<U256, String> {
        let text = text.trim();
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(text.strip_suffix('n').unwrap_or(text), 10),
        };
        parsed.map_err(|err| format!("invalid integer {text:?}: {err}"))
    }

    pub(super) fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<U256>,
    {
        let value = match Raw::deserialize(deserializer)? {
            Raw::Int(int) => U256::from(int),
            Raw::Text(text) => parse(&text).map_err(D::Error::custom)?,
        };
        T::try_from(value).map_err(|_| D::Error::custom(format!("integer {value} out of range")))
    }

    pub(super) fn deserialize_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<U256>,
    {
        deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const CONTEXT: &str = r#"{
        "environment": {
            "network": "localhost",
            "l1NodeUrl": "http://127.0.0.1:8545",
            "l2NodeUrl": "http://127.0.0.1:3050",
            "l2ChainId": "270n",
            "mainWalletPK": "0x7726827caac94a7f9e1b160f7ea819f172f7b6f9d2a97f992c38edeab82d4110",
            "minimalL2GasPrice": "25000000000n",
            "priorityTxMaxGasLimit": "0x47b760",
            "maxLogsLimit": 10000,
            "baseToken": {
                "name": "Ether",
                "symbol": "ETH",
                "decimals": "18n",
                "l1Address": "0x0000000000000000000000000000000000000001"
            },
            "healthcheckPort": "3071"
        },
        "wallets": {
            "erc20.test.ts": "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "contracts/custom.test.ts": "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
            "fees.test.ts": ""
        }
    }"#;

    #[test]
    fn test_parse_context() {
        let context = TestContext::from_json(CONTEXT).unwrap();
        let env = &context.environment;

        assert_eq!(env.network, "localhost");
        assert_eq!(env.l2_node_url.as_str(), "http://127.0.0.1:3050/");
        assert_eq!(env.l2_chain_id, Some(270));
        assert_eq!(env.minimal_l2_gas_price, Some(U256::from(25_000_000_000u64)));
        assert_eq!(env.priority_tx_max_gas_limit, Some(U256::from(4_700_000u64)));
        assert_eq!(env.max_logs_limit, Some(10_000));
        assert_eq!(env.validation_computational_gas_limit, None);
        assert_eq!(env.base_token.as_ref().map(|token| token.decimals), Some(18));
        assert_eq!(env.extra.get("healthcheckPort"), Some(&serde_json::json!("3071")));
        assert!(env.main_wallet_pk.is_some());
    }

    #[test]
    fn test_wallet_lookup() {
        let context = TestContext::from_json(CONTEXT).unwrap();

        assert_eq!(
            context.wallet_for("erc20.test.ts"),
            Some("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
        );
        assert!(context.wallet_for("contracts/custom.test.ts").is_some());
        assert_eq!(context.wallet_for("custom.test.ts"), None);
        // an empty key counts as not provided
        assert_eq!(context.wallet_for("fees.test.ts"), None);
    }

    #[rstest]
    #[case("localhost", true)]
    #[case("Localhost", false)]
    #[case("localhost ", false)]
    #[case("stage", false)]
    #[case("", false)]
    fn test_is_localhost(#[case] network: &str, #[case] expected: bool) {
        let json = serde_json::json!({
            "environment": {
                "network": network,
                "l1NodeUrl": "http://127.0.0.1:8545",
                "l2NodeUrl": "http://127.0.0.1:3050"
            },
            "wallets": {}
        });
        let context: TestContext = serde_json::from_value(json).unwrap();
        assert_eq!(context.environment.is_localhost(), expected);
    }

    #[rstest]
    #[case("123", 123u64)]
    #[case("123n", 123u64)]
    #[case(" 42n ", 42u64)]
    #[case("0x10", 16u64)]
    fn test_parse_big_int(#[case] text: &str, #[case] expected: u64) {
        assert_eq!(big_int::parse(text).unwrap(), U256::from(expected));
    }

    #[test]
    fn test_big_int_beyond_u64() {
        let text = "340282366920938463463374607431768211456n";
        assert_eq!(big_int::parse(text).unwrap(), U256::from(u128::MAX) + U256::from(1u8));
    }

    #[test]
    fn test_rejects_malformed_context() {
        assert!(TestContext::from_json("{}").is_err());
        assert!(TestContext::from_json("not json").is_err());

        let out_of_range =
            CONTEXT.replace("\"270n\"", "\"340282366920938463463374607431768211456n\"");
        assert!(TestContext::from_json(&out_of_range).is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    #[rstest]
    #[case(Some("true"), true)]
    #[case(Some("TRUE"), false)]
    #[case(Some("1"), false)]
    #[case(Some(""), false)]
    #[case(None, false)]
    fn test_fast_mode(#[case] flag: Option<&str>, #[case] expected: bool) {
        let pairs: Vec<_> = flag.map(|flag| (FAST_MODE_ENV, flag)).into_iter().collect();
        let settings = TestSettings::from_vars(vars(&pairs)).unwrap();
        assert_eq!(settings.is_fast_mode(), expected);
    }

    #[test]
    fn test_settings_context() {
        let settings =
            TestSettings::from_vars(vars(&[(CONTEXT_ENV, CONTEXT), ("UNRELATED", "1")])).unwrap();
        let context = TestContext::from_json(settings.raw_context().unwrap()).unwrap();
        assert_eq!(context.environment.network, "localhost");

        let empty = TestSettings::from_vars(vars(&[(CONTEXT_ENV, "")])).unwrap();
        assert_eq!(empty.raw_context(), None);
        assert_eq!(TestSettings::from_vars(Vec::new()).unwrap().raw_context(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_settings_ignore_unrelated_non_utf8_vars() {
        use std::os::unix::ffi::OsStringExt;

        let garbage = OsString::from_vec(vec![0xff, 0xfe]);
        let vars = vec![
            (OsString::from("UNRELATED"), garbage.clone()),
            (garbage.clone(), OsString::from("1")),
            (OsString::from(FAST_MODE_ENV), OsString::from("true")),
            (OsString::from(CONTEXT_ENV), OsString::from(CONTEXT)),
        ];
        let settings = TestSettings::from_os_vars(vars).unwrap();
        assert!(settings.is_fast_mode());
        assert!(settings.raw_context().is_some());

        let err = TestSettings::from_os_vars(vec![(OsString::from(CONTEXT_ENV), garbage)]);
        assert!(matches!(err, Err(envy::Error::Custom(msg)) if msg.contains(CONTEXT_ENV)));
    }
}
