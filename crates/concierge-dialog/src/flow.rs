//! Declarative flow definitions.
//!
//! A flow is an ordered list of [`FlowStep`]s.  Everything that decides how
//! a step behaves (validators, branch rules, side-effect actions) is plain
//! data, so definitions can be serialized, listed and tested without running
//! the engine.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use concierge_store::{ContentCatalog, StoreResult};

use crate::error::{DialogError, Result};

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Guest-recoverable failure codes reported in a [`StepOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowErrorCode {
    ValidationFailed,
    RoomNotAvailable,
    ServiceNotAvailable,
    ItemNotAvailable,
    MaxRetriesExceeded,
}

impl FlowErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::RoomNotAvailable => "ROOM_NOT_AVAILABLE",
            Self::ServiceNotAvailable => "SERVICE_NOT_AVAILABLE",
            Self::ItemNotAvailable => "ITEM_NOT_AVAILABLE",
            Self::MaxRetriesExceeded => "MAX_RETRIES_EXCEEDED",
        }
    }
}

impl std::fmt::Display for FlowErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Why a step rejected the guest's input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub code: FlowErrorCode,
    pub message: String,
}

impl ValidationFailure {
    fn new(code: FlowErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::new(FlowErrorCode::ValidationFailed, message)
    }
}

/// Result of running a validator: the value to store, or a rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Accepted, carrying the canonical value to record.
    Accept(String),
    /// Accepted, with extra facts the engine records under
    /// `{step_id}_{suffix}` next to the value.
    AcceptWith {
        value: String,
        details: Vec<(&'static str, String)>,
    },
    Reject(ValidationFailure),
}

/// Input checks a step can apply.  Catalog-backed variants consult the
/// [`ContentCatalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Validator {
    NonEmpty,
    MinLength { min: usize },
    Email,
    Phone,
    /// Email address or phone number.
    Contact,
    Date,
    Time,
    Number { min: i64, max: i64 },
    GuestCount { min: u32, max: u32 },
    OneOf { options: Vec<String> },
    YesNo,
    RoomAvailable,
    RoomNumber,
    SpaService,
    MenuItem,
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s().-]{7,20}$").expect("phone pattern is a valid regex"));
static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2}|\d{4}))?$").expect("date pattern is a valid regex")
});
static MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+(\d{1,2})(?:st|nd|rd|th)?$",
    )
    .expect("month date pattern is a valid regex")
});
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(am|pm)?$").expect("time pattern is a valid regex")
});
static ROOM_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:room\s*)?#?\s*(\d{3,4})$").expect("room number pattern is a valid regex")
});
static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number pattern is a valid regex"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is a valid regex"));

const RELATIVE_DATES: &[&str] = &[
    "today",
    "tonight",
    "tomorrow",
    "this weekend",
    "next weekend",
    "weekend",
    "next week",
];

impl Validator {
    /// Check `input` and produce the value to record.
    ///
    /// Only catalog-backed validators can fail with an `Err`; everything
    /// else is pure.
    pub fn validate(&self, input: &str, catalog: &dyn ContentCatalog) -> StoreResult<Verdict> {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();

        let verdict = match self {
            Self::NonEmpty => accept_if(!trimmed.is_empty(), trimmed, "Please enter a response."),
            Self::MinLength { min } => accept_if(
                trimmed.chars().count() >= *min,
                trimmed,
                format!("Please provide a bit more detail (at least {min} characters)."),
            ),
            Self::Email => accept_if(
                EMAIL.is_match(trimmed),
                &lowered,
                "That doesn't look like a valid email address. Please try again.",
            ),
            Self::Phone => accept_if(
                is_phone(trimmed),
                trimmed,
                "That doesn't look like a valid phone number. Please try again.",
            ),
            Self::Contact => accept_if(
                EMAIL.is_match(trimmed) || is_phone(trimmed),
                trimmed,
                "Please enter a valid email address or phone number.",
            ),
            Self::Date => accept_if(
                is_date(&lowered),
                &lowered,
                "Please enter a valid date, for example 12/24, March 3 or tomorrow.",
            ),
            Self::Time => match parse_time(&lowered) {
                Some(time) => Verdict::Accept(time),
                None => Verdict::Reject(ValidationFailure::invalid(
                    "Please enter a valid time, for example 2:30 pm.",
                )),
            },
            Self::Number { min, max } => match trimmed.parse::<i64>() {
                Ok(n) if (*min..=*max).contains(&n) => Verdict::Accept(n.to_string()),
                _ => Verdict::Reject(ValidationFailure::invalid(format!(
                    "Please enter a number between {min} and {max}."
                ))),
            },
            Self::GuestCount { min, max } => {
                let count = FIRST_NUMBER
                    .find(trimmed)
                    .and_then(|m| m.as_str().parse::<u32>().ok());
                match count {
                    Some(n) if (*min..=*max).contains(&n) => Verdict::Accept(n.to_string()),
                    _ => Verdict::Reject(ValidationFailure::invalid(format!(
                        "Please enter a number of guests between {min} and {max}."
                    ))),
                }
            }
            Self::OneOf { options } => {
                match options.iter().find(|o| o.eq_ignore_ascii_case(trimmed)) {
                    Some(option) => Verdict::Accept(option.clone()),
                    None => Verdict::Reject(ValidationFailure::invalid(format!(
                        "Please choose one of: {}.",
                        options.join(", ")
                    ))),
                }
            }
            Self::YesNo => match interpret_yes_no(&lowered) {
                Some(true) => Verdict::Accept("yes".into()),
                Some(false) => Verdict::Accept("no".into()),
                None => Verdict::Reject(ValidationFailure::invalid("Please answer yes or no.")),
            },
            Self::RoomNumber => match ROOM_NUMBER.captures(&lowered) {
                Some(caps) => Verdict::Accept(caps[1].to_string()),
                None => Verdict::Reject(ValidationFailure::invalid(
                    "Please enter a valid room number, for example 305.",
                )),
            },
            Self::RoomAvailable => match catalog.room(trimmed)? {
                Some(room) if room.available => Verdict::AcceptWith {
                    value: room.id,
                    details: vec![("type", room.room_type)],
                },
                _ => Verdict::Reject(ValidationFailure::new(
                    FlowErrorCode::RoomNotAvailable,
                    "Sorry, that room isn't available. Please choose another room ID from the list.",
                )),
            },
            Self::SpaService => {
                let services = catalog.spa_services()?;
                let found = services.into_iter().find(|s| {
                    let name = s.name.to_lowercase();
                    s.id.eq_ignore_ascii_case(trimmed)
                        || name == lowered
                        || (lowered.len() >= 4 && name.contains(&lowered))
                });
                match found {
                    Some(service) => Verdict::Accept(service.name),
                    None => Verdict::Reject(ValidationFailure::new(
                        FlowErrorCode::ServiceNotAvailable,
                        "Sorry, that treatment isn't available. Please choose one of our listed spa services.",
                    )),
                }
            }
            Self::MenuItem => {
                let item = match catalog.menu_item(trimmed)? {
                    Some(item) => Some(item),
                    None if lowered.len() >= 4 => catalog
                        .menu()?
                        .into_iter()
                        .find(|m| m.name.to_lowercase().contains(&lowered)),
                    None => None,
                };
                match item {
                    Some(item) => Verdict::Accept(item.name),
                    None => Verdict::Reject(ValidationFailure::new(
                        FlowErrorCode::ItemNotAvailable,
                        "Sorry, I couldn't find that on our menu. Please choose another item.",
                    )),
                }
            }
        };
        Ok(verdict)
    }
}

fn accept_if(ok: bool, value: &str, message: impl Into<String>) -> Verdict {
    if ok {
        Verdict::Accept(value.to_string())
    } else {
        Verdict::Reject(ValidationFailure::invalid(message))
    }
}

fn is_phone(text: &str) -> bool {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    PHONE.is_match(text) && (7..=15).contains(&digits)
}

fn is_date(text: &str) -> bool {
    if RELATIVE_DATES.contains(&text) {
        return true;
    }
    if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() {
        return true;
    }
    if let Some(caps) = NUMERIC_DATE.captures(text) {
        let a: u32 = caps[1].parse().unwrap_or(0);
        let b: u32 = caps[2].parse().unwrap_or(0);
        // Either day/month or month/day.
        let plausible = |day: u32, month: u32| (1..=31).contains(&day) && (1..=12).contains(&month);
        return plausible(a, b) || plausible(b, a);
    }
    if let Some(caps) = MONTH_DATE.captures(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        return (1..=31).contains(&day);
    }
    false
}

/// Parse `H[:MM] [am|pm]` into a canonical `H:MM[ am|pm]` string.
fn parse_time(text: &str) -> Option<String> {
    let caps = TIME.captures(text)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    if minute >= 60 {
        return None;
    }
    match caps.get(3) {
        Some(meridiem) if (1..=12).contains(&hour) => {
            Some(format!("{hour}:{minute:02} {}", meridiem.as_str()))
        }
        // A bare hour without minutes is ambiguous ("3" could be a count).
        None if caps.get(2).is_some() && hour < 24 => Some(format!("{hour}:{minute:02}")),
        _ => None,
    }
}

/// Interpret a short answer as yes (`Some(true)`), no (`Some(false)`) or
/// neither.
pub fn interpret_yes_no(text: &str) -> Option<bool> {
    const YES: &[&str] = &[
        "yes", "y", "yeah", "yep", "yup", "sure", "ok", "okay", "confirm", "confirmed", "correct",
        "absolutely", "definitely", "please",
    ];
    const NO: &[&str] = &["no", "n", "nope", "nah", "cancel", "decline", "don't", "dont"];

    let first = text
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .to_lowercase();
    if YES.contains(&first.as_str()) {
        Some(true)
    } else if NO.contains(&first.as_str()) {
        Some(false)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Branching and actions
// ---------------------------------------------------------------------------

/// Data-driven choice of the next step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchRule {
    /// `then` when the value captured at `step` contains any keyword,
    /// `otherwise` when it does not.
    Keyword {
        step: String,
        keywords: Vec<String>,
        then: String,
        otherwise: String,
    },
    /// `yes` when the value captured at `step` reads as affirmative.
    Affirmative { step: String, yes: String, no: String },
}

impl BranchRule {
    /// Resolve the target step id from the data collected so far.
    pub fn resolve(&self, data: &HashMap<String, String>) -> &str {
        match self {
            Self::Keyword {
                step,
                keywords,
                then,
                otherwise,
            } => {
                let value = data.get(step).map(|v| v.to_lowercase()).unwrap_or_default();
                if keywords.iter().any(|k| value.contains(&k.to_lowercase())) {
                    then.as_str()
                } else {
                    otherwise.as_str()
                }
            }
            Self::Affirmative { step, yes, no } => {
                let affirmative = data
                    .get(step)
                    .and_then(|v| interpret_yes_no(v.as_str()))
                    .unwrap_or(false);
                if affirmative { yes.as_str() } else { no.as_str() }
            }
        }
    }

    /// Every step id this rule can jump to.
    pub fn targets(&self) -> [&str; 2] {
        match self {
            Self::Keyword {
                then, otherwise, ..
            } => [then.as_str(), otherwise.as_str()],
            Self::Affirmative { yes, no, .. } => [yes.as_str(), no.as_str()],
        }
    }
}

/// Side effects run by `action` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    ProcessPayment,
    ScheduleSpa,
    PlaceOrder,
    CreateTicket,
}

impl FlowAction {
    fn prefix(self) -> &'static str {
        match self {
            Self::ProcessPayment => "PAY",
            Self::ScheduleSpa => "SPA",
            Self::PlaceOrder => "ORD",
            Self::CreateTicket => "TKT",
        }
    }

    /// Run the action and return its reference code.
    pub fn perform(self, data: &HashMap<String, String>) -> String {
        let random = Uuid::now_v7().simple().to_string();
        let reference = format!(
            "{}-{}",
            self.prefix(),
            random[random.len() - 8..].to_uppercase()
        );
        tracing::info!(
            action = ?self,
            reference = %reference,
            fields = data.len(),
            "flow action performed"
        );
        reference
    }
}

// ---------------------------------------------------------------------------
// Steps and definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Input,
    Choice,
    Confirmation,
    /// Runs a [`FlowAction`] and auto-advances.
    Action,
    /// Shows its prompt and auto-advances.
    Display,
}

impl StepKind {
    /// Whether the engine moves past this step without waiting for input.
    pub fn auto_advances(self) -> bool {
        matches!(self, Self::Action | Self::Display)
    }
}

/// Where to go after a step accepts its input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum NextStep {
    /// The next step in declaration order.
    #[default]
    Default,
    Goto(String),
    Branch(BranchRule),
    /// Complete the flow.
    Finish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    pub id: String,
    pub kind: StepKind,
    /// May reference collected values as `{step_id}`.
    pub prompt: String,
    #[serde(default)]
    pub validator: Option<Validator>,
    #[serde(default)]
    pub next: NextStep,
    /// Overrides the validator's own rejection message.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Falls back to the engine's configured default when unset.
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub action: Option<FlowAction>,
}

impl FlowStep {
    fn new(id: impl Into<String>, kind: StepKind, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            prompt: prompt.into(),
            validator: None,
            next: NextStep::Default,
            error_message: None,
            max_retries: None,
            options: Vec::new(),
            action: None,
        }
    }

    pub fn input(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, StepKind::Input, prompt)
    }

    /// A choice step; input must be one of `options`.
    pub fn choice(id: impl Into<String>, prompt: impl Into<String>, options: &[&str]) -> Self {
        let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        let mut step = Self::new(id, StepKind::Choice, prompt);
        step.validator = Some(Validator::OneOf {
            options: options.clone(),
        });
        step.options = options;
        step
    }

    /// A yes/no confirmation step.
    pub fn confirmation(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        let mut step = Self::new(id, StepKind::Confirmation, prompt);
        step.validator = Some(Validator::YesNo);
        step
    }

    pub fn action(id: impl Into<String>, prompt: impl Into<String>, action: FlowAction) -> Self {
        let mut step = Self::new(id, StepKind::Action, prompt);
        step.action = Some(action);
        step
    }

    pub fn display(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, StepKind::Display, prompt)
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn goto(mut self, target: impl Into<String>) -> Self {
        self.next = NextStep::Goto(target.into());
        self
    }

    pub fn branch(mut self, rule: BranchRule) -> Self {
        self.next = NextStep::Branch(rule);
        self
    }

    pub fn finish(mut self) -> Self {
        self.next = NextStep::Finish;
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries.max(1));
        self
    }

    /// The prompt with `{step_id}` placeholders filled from `data`.
    pub fn render_prompt(&self, data: &HashMap<String, String>) -> String {
        render_template(&self.prompt, data)
    }
}

/// Replace `{key}` placeholders with values from `data` in one pass; unknown
/// keys are left as written and substituted values are never expanded again.
pub fn render_template(template: &str, data: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match data.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// A named, multi-step dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Intents that start this flow.
    #[serde(default)]
    pub trigger_intents: Vec<String>,
    pub steps: Vec<FlowStep>,
}

impl FlowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            trigger_intents: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn triggered_by(mut self, intents: &[&str]) -> Self {
        self.trigger_intents = intents.iter().map(|i| i.to_string()).collect();
        self
    }

    pub fn with_steps(mut self, steps: Vec<FlowStep>) -> Self {
        self.steps = steps;
        self
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Check structural invariants: non-empty, unique step ids, every jump
    /// target present, every action step has an action.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| DialogError::InvalidFlow {
            flow_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("flow id is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(invalid("flow has no steps".into()));
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(invalid(format!("duplicate step id `{}`", step.id)));
            }
        }

        for step in &self.steps {
            let targets: Vec<&str> = match &step.next {
                NextStep::Default | NextStep::Finish => Vec::new(),
                NextStep::Goto(target) => vec![target.as_str()],
                NextStep::Branch(rule) => rule.targets().to_vec(),
            };
            for target in targets {
                if !ids.contains(target) {
                    return Err(invalid(format!(
                        "step `{}` jumps to unknown step `{target}`",
                        step.id
                    )));
                }
            }
            if step.kind == StepKind::Action && step.action.is_none() {
                return Err(invalid(format!("action step `{}` has no action", step.id)));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Instances and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Active,
    Completed,
    Cancelled,
    /// Retries exhausted; terminal.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetadata {
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub retry_count: u32,
    pub error_reason: Option<String>,
}

/// One execution of a flow for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInstance {
    /// `{flow_id}:{session_id}:{started_at_ms}`.
    pub id: String,
    pub flow_id: String,
    pub session_id: String,
    pub step_index: usize,
    /// Collected values keyed by step id, plus any seeded data.
    pub data: HashMap<String, String>,
    pub status: FlowStatus,
    pub metadata: FlowMetadata,
}

impl FlowInstance {
    pub fn is_active(&self) -> bool {
        self.status == FlowStatus::Active
    }
}

/// What happened when the guest answered a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub success: bool,
    /// Guest-facing text: rejection reason or the next prompt(s).
    pub message: String,
    pub data: HashMap<String, String>,
    /// Step now awaiting input, if any.
    pub next_step: Option<String>,
    pub completed: bool,
    pub error: Option<FlowErrorCode>,
}
