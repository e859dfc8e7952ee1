use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

/// Root run profile.
///
/// This structure is deserialized from a JSON file and tells the CLI:
/// - where the INI `store` with settings and action lists lives
/// - which section holds the action lists (`actions_section`)
/// - which UI `backend` to drive
/// - how the `interpreter` paces loops and reports missing text
/// - which lists to `runs` when none are named on the command line
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Profile {
    /// Path of the INI store (relative paths are resolved against the profile's directory).
    #[validate(min_length = 1)]
    pub store: String,

    /// Section of the store that holds action lists.
    #[serde(default = "default_actions_section")]
    #[validate(min_length = 1)]
    pub actions_section: String,

    /// Backend used to execute actions.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Interpreter pacing and reporting.
    #[serde(default)]
    #[validate]
    pub interpreter: InterpreterSettings,

    /// Action list keys executed, in order, when the command line names none.
    #[serde(default)]
    pub runs: Vec<String>,
}

fn default_actions_section() -> String {
    "Actions".to_string()
}

/// Backend selection.
/// Use `type` to select a variant:
/// - "webdriver": a browser driven over the W3C WebDriver protocol
/// - "desktop": simulated mouse/keyboard input with coordinate locators
/// - "dry_run": log every call without touching any UI
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    #[serde(rename = "webdriver")]
    WebDriver(WebDriverSettings),

    Desktop,

    DryRun {
        /// Whether `exist`/`text` treat every locator as present (default: true).
        #[serde(default = "default_true")]
        assume_present: bool,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::WebDriver(WebDriverSettings::default())
    }
}

/// Settings of a WebDriver browser session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct WebDriverSettings {
    /// WebDriver server URL (e.g., chromedriver's "http://localhost:9515").
    #[validate(min_length = 1)]
    pub endpoint: String,

    /// Value of the `browserName` capability.
    pub browser_name: String,

    /// Run the browser without a window.
    pub headless: bool,

    /// Browser user data directory; only used together with `profile_directory`.
    pub user_data_directory: Option<String>,

    /// Profile directory inside `user_data_directory` (e.g., "Default").
    pub profile_directory: Option<String>,

    /// Implicit wait applied to element lookups, in seconds.
    #[validate(minimum = 0.0)]
    #[validate(maximum = 300.0)]
    pub implicit_wait_secs: f64,

    /// Timeout of a single HTTP request to the endpoint, in seconds.
    #[validate(minimum = 1)]
    #[validate(maximum = 3600)]
    pub request_timeout_secs: u64,

    /// How locators are interpreted.
    pub locator_strategy: LocatorStrategy,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".to_string(),
            browser_name: "chrome".to_string(),
            headless: true,
            user_data_directory: None,
            profile_directory: None,
            implicit_wait_secs: 4.0,
            request_timeout_secs: 120,
            locator_strategy: LocatorStrategy::default(),
        }
    }
}

/// WebDriver element location strategy.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    #[default]
    Xpath,
    Css,
}

impl LocatorStrategy {
    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            LocatorStrategy::Xpath => "xpath",
            LocatorStrategy::Css => "css selector",
        }
    }
}

/// Interpreter behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Delay after each `for` iteration, in milliseconds.
    #[validate(maximum = 60000)]
    pub loop_delay_ms: u64,

    /// What `text` records when its locator matches nothing.
    pub missing_text: MissingTextPolicy,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            loop_delay_ms: 1000,
            missing_text: MissingTextPolicy::default(),
        }
    }
}

/// Policy for `text` actions whose locator matches nothing.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingTextPolicy {
    /// Record nothing.
    #[default]
    Skip,
    /// Record "<label> does not exist." when a label is known, nothing otherwise.
    Diagnostic,
}

fn default_true() -> bool {
    true
}
