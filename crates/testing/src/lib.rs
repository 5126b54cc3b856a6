//! # Testkit testing.
//!
//! Bootstrap for rollup integration test suites.
//!
//! Every suite process owns one [`TestMaster`]. On first access it reads the [`TestContext`]
//! prepared for the run, picks the private key funded for the suite, and connects to the
//! base-layer and rollup-layer nodes. Suites then ask it for the funded account or for fresh
//! empty accounts, whose funds are swept back when the suite calls
//! [`TestMaster::deinitialize`].
//!
//! ```no_run
//! # async fn suite() -> Result<(), testkit_testing::TestMasterError> {
//! use testkit_testing::TestMaster;
//!
//! let master = TestMaster::get_instance(file!())?;
//! let alice = master.main_account();
//! let bob = master.new_empty_account();
//! # let _ = (alice, bob);
//! master.deinitialize().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod context;
pub use context::{TestContext, TestEnvironment, TestSettings, CONTEXT_ENV, FAST_MODE_ENV};

/// Construction of the network clients.
pub mod provider;

mod reporter;
pub use reporter::{Action, Reporter};

mod test_master;
pub use test_master::{suite_name, TestMaster, TestMasterError, SUITE_PATH_MARKER};
