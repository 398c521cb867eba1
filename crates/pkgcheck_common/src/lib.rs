//! Package check common library.
//!
//! Test plan expansion for app packages and level grading of their results.

pub mod app_manifest;
pub mod config;
pub mod dump;
pub mod error;
pub mod grading;
pub mod levels;
pub mod probe;
pub mod question;
pub mod report;
pub mod results;
pub mod summary;
pub mod test_manifest;
pub mod test_plan;

pub use error::{PkgcheckError, Result};
pub use grading::{grade, Grade, LevelOverride};
pub use question::{default_value, InstallArgs, Question, QuestionType};
pub use results::{ExecutedTest, MainResult, ResultRecord};
pub use test_plan::{build_test_list, AppTraits, TestCase, TestKind, TestList};
