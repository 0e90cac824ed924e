use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Default absolute/relative tolerance for `ComparisonPolicy::Float`
pub const DEFAULT_FLOAT_EPSILON: f64 = 1e-6;

/// Malformed input to the driver. Always fatal: no verdict is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("test case list is empty")]
    EmptyInput,
    #[error("function schema is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unknown argument type `{0}`")]
    UnknownArgType(String),
    #[error("duplicate test case id `{0}`")]
    DuplicateCaseId(String),
}

/// Argument type names understood in a function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    String,
    Character,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    /// `array` or `array<elem>`
    Array(Option<Box<ArgType>>),
}

impl FromStr for ArgType {
    type Err = ContractViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();

        if let Some(rest) = name.strip_prefix("array") {
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(ArgType::Array(None));
            }
            return match rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
                Some(elem) => Ok(ArgType::Array(Some(Box::new(elem.parse()?)))),
                None => Err(ContractViolation::UnknownArgType(s.to_string())),
            };
        }

        match name.as_str() {
            "string" => Ok(ArgType::String),
            "character" | "char" => Ok(ArgType::Character),
            "integer" | "int" => Ok(ArgType::Integer),
            "long" => Ok(ArgType::Long),
            "float" => Ok(ArgType::Float),
            "double" => Ok(ArgType::Double),
            "boolean" | "bool" => Ok(ArgType::Boolean),
            _ => Err(ContractViolation::UnknownArgType(s.to_string())),
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::String => write!(f, "string"),
            ArgType::Character => write!(f, "character"),
            ArgType::Integer => write!(f, "integer"),
            ArgType::Long => write!(f, "long"),
            ArgType::Float => write!(f, "float"),
            ArgType::Double => write!(f, "double"),
            ArgType::Boolean => write!(f, "boolean"),
            ArgType::Array(None) => write!(f, "array"),
            ArgType::Array(Some(elem)) => write!(f, "array<{}>", elem),
        }
    }
}

/// The submitted function. The body is opaque to the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    #[serde(alias = "code")]
    pub body: String,
    #[serde(rename = "argSignature", default)]
    pub arg_signature: Vec<String>,
}

impl FunctionSchema {
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        arg_signature: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            arg_signature: arg_signature.into_iter().map(Into::into).collect(),
        }
    }

    /// Check required fields and parse the signature
    pub fn validate(&self) -> Result<Vec<ArgType>, ContractViolation> {
        if self.name.trim().is_empty() {
            return Err(ContractViolation::MissingField("name"));
        }
        if self.body.trim().is_empty() {
            return Err(ContractViolation::MissingField("body"));
        }
        self.arg_signature.iter().map(|t| t.parse()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "_id", alias = "id", deserialize_with = "deserialize_case_id")]
    pub id: String,
    /// One argument per line
    #[serde(deserialize_with = "deserialize_case_input")]
    pub input: String,
    #[serde(rename = "expectedOutput", alias = "output")]
    pub expected_output: String,
    #[serde(rename = "isSample", default)]
    pub is_sample: bool,
}

impl TestCase {
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            expected_output: expected_output.into(),
            is_sample: false,
        }
    }

    pub fn sample(mut self) -> Self {
        self.is_sample = true;
        self
    }
}

/// Test case ids arrive either as plain strings or as `{"$oid": "..."}` documents
fn deserialize_case_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Plain(String),
        Number(u64),
        ObjectId {
            #[serde(rename = "$oid")]
            oid: String,
        },
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Plain(id) => id,
        RawId::Number(id) => id.to_string(),
        RawId::ObjectId { oid } => oid,
    })
}

/// Inputs arrive either as one string or as a list with one string per argument
fn deserialize_case_input<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInput {
        Text(String),
        Arguments(Vec<String>),
    }

    Ok(match RawInput::deserialize(deserializer)? {
        RawInput::Text(input) => input,
        RawInput::Arguments(args) => args.join("\n"),
    })
}

/// Ensure a suite can be run at all: non-empty and with unique ids
pub fn validate_test_cases(test_cases: &[TestCase]) -> Result<(), ContractViolation> {
    if test_cases.is_empty() {
        return Err(ContractViolation::EmptyInput);
    }

    let mut seen = HashSet::with_capacity(test_cases.len());
    for tc in test_cases {
        if !seen.insert(tc.id.as_str()) {
            return Err(ContractViolation::DuplicateCaseId(tc.id.clone()));
        }
    }
    Ok(())
}

/// Outcome of one test case. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    #[serde(rename = "caseNo")]
    pub case_no: u32,
    #[serde(rename = "time")]
    pub elapsed_seconds: f64,
    #[serde(rename = "memory")]
    pub memory_mb: f64,
    pub passed: bool,
    #[serde(rename = "output")]
    pub actual_output: String,
    #[serde(rename = "isSample")]
    pub is_sample: bool,
    pub input: String,
    pub expected: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "consoleOutput")]
    pub console_output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictStatus {
    Passed,
    Failed,
}

/// Final record of one suite run.
///
/// Averages are kept at full precision and only rounded to two decimals when
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(rename = "STATUS")]
    pub status: VerdictStatus,
    #[serde(rename = "failedCaseNo", default, skip_serializing_if = "Option::is_none")]
    pub first_failed_case_no: Option<u32>,
    #[serde(rename = "avgTime", serialize_with = "serialize_rounded")]
    pub avg_time_seconds: f64,
    #[serde(rename = "avgMemory", serialize_with = "serialize_rounded")]
    pub avg_memory_mb: f64,
    pub results: Vec<CaseResult>,
    #[serde(rename = "driver")]
    pub driver_id: String,
    #[serde(rename = "timestamp")]
    pub timestamp_epoch_seconds: i64,
}

impl Verdict {
    pub fn is_passed(&self) -> bool {
        self.status == VerdictStatus::Passed
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Round to the two decimals used for display
pub fn round_for_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_rounded<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_for_display(*value))
}

/// Document emitted instead of a verdict when a run aborts
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    #[serde(rename = "STATUS")]
    pub status: &'static str,
    pub message: String,
    pub driver: String,
    pub timestamp: i64,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, driver: impl Into<String>, timestamp: i64) -> Self {
        Self {
            status: "ERROR",
            message: message.into(),
            driver: driver.into(),
            timestamp,
        }
    }
}

/// How actual output is matched against the expected output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComparisonPolicy {
    /// Byte-for-byte string equality
    #[default]
    Exact,
    /// Equality after trimming leading/trailing whitespace
    Trimmed,
    /// Both sides parsed as JSON and compared as values
    Json,
    /// Whitespace-separated tokens, numbers compared within `epsilon`
    Float { epsilon: f64 },
}

impl FromStr for ComparisonPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "exact" => Ok(ComparisonPolicy::Exact),
            "trimmed" => Ok(ComparisonPolicy::Trimmed),
            "json" => Ok(ComparisonPolicy::Json),
            "float" => Ok(ComparisonPolicy::Float { epsilon: DEFAULT_FLOAT_EPSILON }),
            other => match other.strip_prefix("float:") {
                Some(eps) => match eps.parse::<f64>() {
                    Ok(epsilon) if epsilon.is_finite() && epsilon >= 0.0 => {
                        Ok(ComparisonPolicy::Float { epsilon })
                    }
                    _ => Err(format!("invalid float tolerance: {}", eps)),
                },
                None => Err(format!(
                    "unknown comparator `{}` (expected exact, trimmed, json, float[:eps])",
                    s
                )),
            },
        }
    }
}

impl fmt::Display for ComparisonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonPolicy::Exact => write!(f, "exact"),
            ComparisonPolicy::Trimmed => write!(f, "trimmed"),
            ComparisonPolicy::Json => write!(f, "json"),
            ComparisonPolicy::Float { epsilon } => write!(f, "float:{}", epsilon),
        }
    }
}

impl TryFrom<String> for ComparisonPolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComparisonPolicy> for String {
    fn from(policy: ComparisonPolicy) -> Self {
        policy.to_string()
    }
}

/// A judge request: one function and the cases to run it against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub schema: FunctionSchema,
    #[serde(rename = "testCases")]
    pub test_cases: Vec<TestCase>,
    #[serde(rename = "timeoutMs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<ComparisonPolicy>,
}
