//! Offline rule-based responder
//!
//! An ordered table of `(predicate, reply builder)` rules evaluated in fixed
//! priority order; the first matching rule produces the reply. The default
//! table answers a handful of Portuguese small-talk intents and always ends
//! with a catch-all.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, Timelike, Weekday};
use regex::Regex;
use std::sync::LazyLock;

use super::{Responder, ResponderError};

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:me chamo|meu nome é|meu nome e|pode me chamar de)\s+([a-záéíóúâêîôûãõç]+)",
    )
    .unwrap()
});

static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(que horas|horas são|horas sao)\b").unwrap());

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(que dia é hoje|que dia e hoje|data de hoje|qual a data)\b").unwrap()
});

static WELLBEING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tudo bem|como vai|como você está|como voce esta)\b").unwrap()
});

static THANKS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(obrigad[oa]|valeu)\b").unwrap());

static FAREWELL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tchau|até logo|ate logo|até mais|ate mais)\b").unwrap()
});

static GREETING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(oi|olá|ola|bom dia|boa tarde|boa noite|e aí|e ai)\b").unwrap()
});

const UNKNOWN_REPLY: &str =
    "Desculpe, ainda não sei responder isso. Pode perguntar de outro jeito?";

/// What a rule sees when it is evaluated
#[derive(Debug, Clone)]
pub struct RuleInput<'a> {
    /// The trimmed utterance
    pub text: &'a str,
    /// Evaluation time
    pub now: DateTime<Local>,
}

type Predicate = Box<dyn Fn(&RuleInput<'_>) -> bool + Send + Sync>;
type Builder = Box<dyn Fn(&RuleInput<'_>) -> String + Send + Sync>;

/// One entry of the rule table
pub struct Rule {
    name: &'static str,
    predicate: Predicate,
    build: Builder,
}

impl Rule {
    /// Create a rule from a predicate and a reply builder
    pub fn new<P, B>(name: &'static str, predicate: P, build: B) -> Self
    where
        P: Fn(&RuleInput<'_>) -> bool + Send + Sync + 'static,
        B: Fn(&RuleInput<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Box::new(predicate),
            build: Box::new(build),
        }
    }

    /// Rule that matches when `pattern` is found anywhere in the utterance
    pub fn pattern<B>(name: &'static str, pattern: &'static LazyLock<Regex>, build: B) -> Self
    where
        B: Fn(&RuleInput<'_>) -> String + Send + Sync + 'static,
    {
        Self::new(name, move |input| pattern.is_match(input.text), build)
    }

    /// Rule that always matches
    pub fn catch_all(reply: &'static str) -> Self {
        Self::new("catch_all", |_| true, move |_| reply.to_string())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Rule-table responder
#[derive(Debug)]
pub struct RuleResponder {
    rules: Vec<Rule>,
}

impl RuleResponder {
    /// Create a responder from an ordered rule table
    ///
    /// A catch-all is appended so the table always produces a reply.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.push(Rule::catch_all(UNKNOWN_REPLY));
        Self { rules }
    }

    /// The built-in Portuguese small-talk table
    pub fn with_default_rules() -> Self {
        Self::new(default_rules())
    }

    /// Rule names in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Evaluate the table at a given time; first match wins
    pub fn reply_at(&self, text: &str, now: DateTime<Local>) -> String {
        let input = RuleInput {
            text: text.trim(),
            now,
        };
        for rule in &self.rules {
            if (rule.predicate)(&input) {
                tracing::debug!("Rule '{}' matched", rule.name);
                return (rule.build)(&input);
            }
        }
        UNKNOWN_REPLY.to_string()
    }
}

#[async_trait]
impl Responder for RuleResponder {
    async fn respond(&self, utterance: &str) -> Result<String, ResponderError> {
        Ok(self.reply_at(utterance, Local::now()))
    }

    fn name(&self) -> &str {
        "rules"
    }
}

fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "name",
            |input| NAME_PATTERN.is_match(input.text),
            |input| {
                let name = NAME_PATTERN
                    .captures(input.text)
                    .and_then(|c| c.get(1))
                    .map(|m| capitalise(m.as_str()))
                    .unwrap_or_default();
                format!("Prazer em te conhecer, {}! Vou lembrar disso.", name)
            },
        ),
        Rule::pattern("time", &TIME_PATTERN, |input| {
            format!("Agora são {:02}:{:02}.", input.now.hour(), input.now.minute())
        }),
        Rule::pattern("date", &DATE_PATTERN, |input| {
            format!(
                "Hoje é {}, {:02}/{:02}/{}.",
                weekday_name(input.now.weekday()),
                input.now.day(),
                input.now.month(),
                input.now.year()
            )
        }),
        Rule::pattern("wellbeing", &WELLBEING_PATTERN, |_| {
            "Estou ótimo, obrigado por perguntar! E você?".to_string()
        }),
        Rule::pattern("thanks", &THANKS_PATTERN, |_| {
            "Por nada! Estou aqui para ajudar.".to_string()
        }),
        Rule::pattern("farewell", &FAREWELL_PATTERN, |_| {
            "Até logo! Foi bom conversar com você.".to_string()
        }),
        Rule::pattern("greeting", &GREETING_PATTERN, |_| {
            "Olá! Como posso ajudar?".to_string()
        }),
    ]
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        // 2026-10-16 is a Friday
        Local
            .with_ymd_and_hms(2026, 10, 16, hour, minute, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn test_greeting() {
        let responder = RuleResponder::with_default_rules();
        assert_eq!(responder.reply_at("oi", at(9, 0)), "Olá! Como posso ajudar?");
        assert_eq!(responder.reply_at("Bom dia!", at(9, 0)), "Olá! Como posso ajudar?");
    }

    #[test]
    fn test_time_reply_uses_clock() {
        let responder = RuleResponder::with_default_rules();
        assert_eq!(
            responder.reply_at("que horas são?", at(14, 5)),
            "Agora são 14:05."
        );
    }

    #[test]
    fn test_date_reply_in_portuguese() {
        let responder = RuleResponder::with_default_rules();
        assert_eq!(
            responder.reply_at("que dia é hoje", at(10, 0)),
            "Hoje é sexta-feira, 16/10/2026."
        );
    }

    #[test]
    fn test_name_is_captured_and_capitalised() {
        let responder = RuleResponder::with_default_rules();
        assert_eq!(
            responder.reply_at("oi, me chamo joão", at(10, 0)),
            "Prazer em te conhecer, João! Vou lembrar disso."
        );
    }

    #[test]
    fn test_priority_order_first_match_wins() {
        let responder = RuleResponder::with_default_rules();
        // Contains both a greeting and a time question; time has priority
        assert_eq!(
            responder.reply_at("oi, que horas são", at(8, 30)),
            "Agora são 08:30."
        );
    }

    #[test]
    fn test_unknown_falls_through_to_catch_all() {
        let responder = RuleResponder::with_default_rules();
        assert_eq!(responder.reply_at("explique a relatividade", at(8, 30)), UNKNOWN_REPLY);
    }

    #[test]
    fn test_rule_table_order() {
        let responder = RuleResponder::with_default_rules();
        let names = responder.rule_names();
        assert_eq!(names.first(), Some(&"name"));
        assert_eq!(names.last(), Some(&"catch_all"));
    }

    #[test]
    fn test_custom_rules_precede_catch_all() {
        let responder = RuleResponder::new(vec![Rule::new(
            "echo",
            |input| input.text.starts_with("repita"),
            |input| input.text.trim_start_matches("repita").trim().to_string(),
        )]);
        assert_eq!(responder.reply_at("repita olá mundo", at(8, 0)), "olá mundo");
        assert_eq!(responder.reply_at("oi", at(8, 0)), UNKNOWN_REPLY);
    }

    #[tokio::test]
    async fn test_respond_never_fails() {
        let responder = RuleResponder::with_default_rules();
        let reply = responder.respond("obrigado").await.unwrap();
        assert_eq!(reply, "Por nada! Estou aqui para ajudar.");
    }
}
