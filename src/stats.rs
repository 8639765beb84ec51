use crate::models::{MessageRecord, ProjectRecord, Role, SessionRecord};
use crate::pricing::PriceTable;
use chrono::{Datelike, Local, NaiveDate, TimeZone};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Messages from this provider carry a metered `cost` taken at face value;
/// every other provider's spend is estimated from the price table.
pub const FIRST_PARTY_PROVIDER: &str = "opencode";

const TOP_N: usize = 3;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RankedUsage {
    pub id: String,
    pub display_name: String,
    pub count: u64,
    /// Share of assistant messages carrying this attribute, rounded to the
    /// nearest integer percent.
    pub percent: u8,
}

/// One year of usage, aggregated. Immutable once computed.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyStats {
    pub year: i32,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub total_projects: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// input + output. Reasoning and cache counts are tracked separately.
    pub total_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    /// Sum of metered `cost` fields from first-party messages.
    pub metered_cost: f64,
    /// Price-table estimate over every other provider's messages.
    pub estimated_cost: f64,
    pub top_models: Vec<RankedUsage>,
    pub top_providers: Vec<RankedUsage>,
    pub max_streak: u64,
    pub current_streak: u64,
    pub max_streak_days: BTreeSet<String>,
    /// Day-key → message count for the requested year.
    pub daily_messages: BTreeMap<String, u64>,
    pub busiest_day: Option<(String, u64)>,
    /// Monday = index 0.
    pub weekday_counts: [u64; 7],
    pub busiest_weekday: Option<usize>,
    /// Over the entire session history, not just the requested year.
    pub days_since_first_session: i64,
}

pub fn compute_yearly_stats(
    year: i32,
    sessions: &[SessionRecord],
    messages: &[MessageRecord],
    projects: &[ProjectRecord],
    prices: &PriceTable,
) -> YearlyStats {
    compute_yearly_stats_at(
        year,
        sessions,
        messages,
        projects,
        prices,
        Local::now().date_naive(),
    )
}

/// Same as [`compute_yearly_stats`] with an explicit "today", which pins the
/// two invocation-relative figures (`current_streak`,
/// `days_since_first_session`) for tests.
pub fn compute_yearly_stats_at(
    year: i32,
    sessions: &[SessionRecord],
    messages: &[MessageRecord],
    projects: &[ProjectRecord],
    prices: &PriceTable,
    today: NaiveDate,
) -> YearlyStats {
    let mut total_sessions = 0u64;
    let mut first_session: Option<NaiveDate> = None;
    for s in sessions {
        let Some(date) = local_date(s.time.created) else {
            continue;
        };
        if date.year() == year {
            total_sessions += 1;
        }
        if first_session.is_none_or(|f| date < f) {
            first_session = Some(date);
        }
    }
    let days_since_first_session = first_session.map_or(0, |f| (today - f).num_days().max(0));

    let mut total_messages = 0u64;
    let mut total_input_tokens = 0u64;
    let mut total_output_tokens = 0u64;
    let mut cache_read_tokens = 0u64;
    let mut cache_write_tokens = 0u64;
    let mut metered_cost = 0.0f64;
    let mut estimated_cost = 0.0f64;
    let mut daily_messages: BTreeMap<String, u64> = BTreeMap::new();
    let mut all_time_active: HashSet<NaiveDate> = HashSet::new();
    let mut weekday_counts = [0u64; 7];
    let mut models = Ranker::default();
    let mut providers = Ranker::default();

    for m in messages {
        let Some(date) = local_date(m.time.created) else {
            continue;
        };
        // The all-time set feeds the current streak, which may span the year
        // boundary; everything else is scoped to the requested year.
        all_time_active.insert(date);
        if date.year() != year {
            continue;
        }

        total_messages += 1;
        *daily_messages.entry(day_key(date)).or_insert(0) += 1;
        weekday_counts[date.weekday().num_days_from_monday() as usize] += 1;

        if let Some(t) = &m.tokens {
            total_input_tokens += t.input;
            total_output_tokens += t.output;
            cache_read_tokens += t.cache.read;
            cache_write_tokens += t.cache.write;
        }

        if m.provider_id() == Some(FIRST_PARTY_PROVIDER) {
            if let Some(cost) = m.cost {
                metered_cost += cost;
            }
        } else if let (Some(model), Some(t)) = (m.model_id(), m.tokens.as_ref()) {
            // No price entry → the message contributes zero, silently.
            if let Some(entry) = prices.entry(model) {
                estimated_cost += t.input as f64 * entry.input / 1e6
                    + t.output as f64 * entry.output / 1e6
                    + entry.cache_read.map_or(0.0, |r| t.cache.read as f64 * r / 1e6)
                    + entry.cache_write.map_or(0.0, |r| t.cache.write as f64 * r / 1e6);
            }
        }

        if m.role == Role::Assistant {
            if let Some(model) = m.model_id() {
                models.add(model);
            }
            if let Some(provider) = m.provider_id() {
                providers.add(provider);
            }
        }
    }

    let (max_streak, max_streak_days) = longest_streak(&daily_messages);

    YearlyStats {
        year,
        total_sessions,
        total_messages,
        total_projects: projects.len() as u64,
        total_input_tokens,
        total_output_tokens,
        total_tokens: total_input_tokens + total_output_tokens,
        cache_read_tokens,
        cache_write_tokens,
        metered_cost,
        estimated_cost,
        top_models: models.into_top(TOP_N, |id| prices.model_display_name(id)),
        top_providers: providers.into_top(TOP_N, |id| prices.provider_display_name(id)),
        max_streak,
        current_streak: current_streak(&all_time_active, today),
        max_streak_days,
        busiest_day: busiest_day(&daily_messages),
        daily_messages,
        weekday_counts,
        busiest_weekday: busiest_weekday(&weekday_counts),
        days_since_first_session,
    }
}

pub(crate) fn local_date(epoch_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|dt| dt.date_naive())
}

pub(crate) fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Counts occurrences in encounter order so that the descending stable sort
/// in `into_top` breaks count ties toward whichever id appeared first.
#[derive(Default)]
struct Ranker {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
    total: u64,
}

impl Ranker {
    fn add(&mut self, id: &str) {
        self.total += 1;
        match self.index.get(id) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert(id.to_string(), self.counts.len());
                self.counts.push((id.to_string(), 1));
            }
        }
    }

    fn into_top(mut self, n: usize, display: impl Fn(&str) -> String) -> Vec<RankedUsage> {
        let total = self.total;
        self.counts.sort_by(|a, b| b.1.cmp(&a.1));
        self.counts.truncate(n);
        self.counts
            .into_iter()
            .map(|(id, count)| RankedUsage {
                display_name: display(&id),
                percent: (count as f64 * 100.0 / total as f64).round() as u8,
                id,
                count,
            })
            .collect()
    }
}

/// Longest run of consecutive active days in the year map. On ties for
/// longest, the earliest run wins. Returns the run length and its day keys,
/// endpoints inclusive.
fn longest_streak(daily: &BTreeMap<String, u64>) -> (u64, BTreeSet<String>) {
    let dates: Vec<NaiveDate> = daily
        .keys()
        .filter_map(|k| NaiveDate::parse_from_str(k, "%Y-%m-%d").ok())
        .collect();
    if dates.is_empty() {
        return (0, BTreeSet::new());
    }

    let mut best = (0usize, 0usize); // (start index, length)
    let mut run_start = 0usize;
    for i in 1..=dates.len() {
        let run_broke = i == dates.len() || (dates[i] - dates[i - 1]).num_days() != 1;
        if run_broke {
            let len = i - run_start;
            if len > best.1 {
                best = (run_start, len);
            }
            run_start = i;
        }
    }

    let days = dates[best.0..best.0 + best.1]
        .iter()
        .map(|d| day_key(*d))
        .collect();
    (best.1 as u64, days)
}

/// Anchored at today if today is active, else yesterday if yesterday is,
/// else zero; then walks backwards day by day. Deliberately unconstrained by
/// the requested year so a streak spanning the boundary reports whole.
fn current_streak(active: &HashSet<NaiveDate>, today: NaiveDate) -> u64 {
    let anchor = if active.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(y) if active.contains(&y) => y,
            _ => return 0,
        }
    };

    let mut streak = 0u64;
    let mut day = anchor;
    while active.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Highest count wins; on ties the earliest date wins, which the ascending
/// BTreeMap scan plus strict-greater comparison guarantees.
fn busiest_day(daily: &BTreeMap<String, u64>) -> Option<(String, u64)> {
    let mut best: Option<(&String, u64)> = None;
    for (key, &count) in daily {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(key, count)| (key.clone(), count))
}

/// Ties go to the lowest index (earliest weekday, Monday first).
fn busiest_weekday(counts: &[u64; 7]) -> Option<usize> {
    if counts.iter().all(|&c| c == 0) {
        return None;
    }
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate().skip(1) {
        if c > counts[best] {
            best = i;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Midday local time keeps the calendar date stable across DST shifts.
    fn ms(y: i32, m: u32, d: u32) -> i64 {
        Local
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(id: &str, created: i64) -> SessionRecord {
        serde_json::from_value(json!({
            "id": id, "projectID": "prj_a", "time": { "created": created }
        }))
        .unwrap()
    }

    fn user_msg(id: &str, created: i64) -> MessageRecord {
        serde_json::from_value(json!({
            "id": id, "sessionID": "ses_a", "role": "user",
            "time": { "created": created }
        }))
        .unwrap()
    }

    fn assistant_msg(
        id: &str,
        created: i64,
        provider: &str,
        model: &str,
        extra: serde_json::Value,
    ) -> MessageRecord {
        let mut value = json!({
            "id": id, "sessionID": "ses_a", "role": "assistant",
            "time": { "created": created },
            "providerID": provider, "modelID": model
        });
        value
            .as_object_mut()
            .unwrap()
            .extend(extra.as_object().cloned().unwrap_or_default());
        serde_json::from_value(value).unwrap()
    }

    fn price_table() -> PriceTable {
        PriceTable::from_document(
            r#"{
                "anthropic": {
                    "name": "Anthropic",
                    "models": {
                        "claude-sonnet-4": {
                            "name": "Claude Sonnet 4",
                            "cost": { "input": 3, "output": 15, "cache_read": 0.3, "cache_write": 3.75 }
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn compute(messages: &[MessageRecord], today: NaiveDate) -> YearlyStats {
        compute_yearly_stats_at(2025, &[], messages, &[], &price_table(), today)
    }

    #[test]
    fn scenario_a_gap_bounds_the_longest_streak() {
        let messages = vec![
            user_msg("m1", ms(2025, 1, 1)),
            user_msg("m2", ms(2025, 1, 2)),
            user_msg("m3", ms(2025, 1, 3)),
            user_msg("m4", ms(2025, 1, 10)),
        ];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.max_streak, 3);
        let expected: BTreeSet<String> = ["2025-01-01", "2025-01-02", "2025-01-03"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(stats.max_streak_days, expected);
        // Cardinality always matches the streak length.
        assert_eq!(stats.max_streak_days.len() as u64, stats.max_streak);
    }

    #[test]
    fn scenario_b_earlier_of_equal_streaks_wins() {
        let messages = vec![
            user_msg("m1", ms(2025, 2, 1)),
            user_msg("m2", ms(2025, 2, 2)),
            user_msg("m3", ms(2025, 5, 20)),
            user_msg("m4", ms(2025, 5, 21)),
        ];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.max_streak, 2);
        assert!(stats.max_streak_days.contains("2025-02-01"));
        assert!(stats.max_streak_days.contains("2025-02-02"));
        assert!(!stats.max_streak_days.contains("2025-05-20"));
    }

    #[test]
    fn scenario_c_estimated_cost_from_price_table() {
        let messages = vec![assistant_msg(
            "m1",
            ms(2025, 3, 1),
            "anthropic",
            "claude-sonnet-4",
            json!({ "tokens": { "input": 100, "output": 50 } }),
        )];
        let stats = compute(&messages, date(2025, 6, 1));
        let expected = 100.0 * 3.0 / 1e6 + 50.0 * 15.0 / 1e6;
        assert!((stats.estimated_cost - expected).abs() < 1e-12);
        assert_eq!(stats.metered_cost, 0.0);
    }

    #[test]
    fn scenario_d_first_party_cost_is_metered_not_estimated() {
        let messages = vec![assistant_msg(
            "m1",
            ms(2025, 3, 1),
            FIRST_PARTY_PROVIDER,
            "claude-sonnet-4",
            json!({ "cost": 0.42, "tokens": { "input": 100, "output": 50 } }),
        )];
        let stats = compute(&messages, date(2025, 6, 1));
        assert!((stats.metered_cost - 0.42).abs() < 1e-12);
        // Even though the model is priced, first-party messages never hit the table.
        assert_eq!(stats.estimated_cost, 0.0);
    }

    #[test]
    fn scenario_e_history_outlives_the_requested_year() {
        let sessions = vec![session("s1", ms(2024, 6, 1))];
        let messages = vec![user_msg("m1", ms(2024, 6, 1))];
        let stats = compute_yearly_stats_at(
            2025,
            &sessions,
            &messages,
            &[],
            &price_table(),
            date(2025, 6, 1),
        );
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.days_since_first_session, 365);
    }

    #[test]
    fn scenario_f_current_streak_anchors_on_yesterday() {
        let messages = vec![
            user_msg("m1", ms(2025, 6, 11)),
            user_msg("m2", ms(2025, 6, 12)),
            user_msg("m3", ms(2025, 6, 13)),
            user_msg("m4", ms(2025, 6, 14)),
        ];
        let stats = compute(&messages, date(2025, 6, 15));
        assert_eq!(stats.current_streak, 4);
    }

    #[test]
    fn current_streak_zero_without_recent_activity() {
        let messages = vec![user_msg("m1", ms(2025, 6, 10))];
        let stats = compute(&messages, date(2025, 6, 15));
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn current_streak_spans_the_year_boundary() {
        let messages = vec![
            user_msg("m1", ms(2024, 12, 30)),
            user_msg("m2", ms(2024, 12, 31)),
            user_msg("m3", ms(2025, 1, 1)),
        ];
        let stats = compute_yearly_stats_at(
            2024,
            &[],
            &messages,
            &[],
            &price_table(),
            date(2025, 1, 1),
        );
        // The 2025 message is outside the requested year for every other
        // metric, but the current streak still counts it.
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.current_streak, 3);
    }

    #[test]
    fn token_totals_treat_absent_breakdowns_as_zero() {
        let messages = vec![
            assistant_msg(
                "m1",
                ms(2025, 3, 1),
                "anthropic",
                "claude-sonnet-4",
                json!({ "tokens": { "input": 100, "output": 40, "cache": { "read": 7, "write": 3 } } }),
            ),
            user_msg("m2", ms(2025, 3, 1)),
        ];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.total_input_tokens, 100);
        assert_eq!(stats.total_output_tokens, 40);
        assert_eq!(stats.total_tokens, 140);
        assert_eq!(stats.cache_read_tokens, 7);
        assert_eq!(stats.cache_write_tokens, 3);
        assert_eq!(
            stats.total_tokens,
            stats.total_input_tokens + stats.total_output_tokens
        );
    }

    #[test]
    fn unpriced_models_contribute_zero_estimated_cost() {
        let messages = vec![assistant_msg(
            "m1",
            ms(2025, 3, 1),
            "mystery",
            "unknown-model",
            json!({ "tokens": { "input": 1000000, "output": 1000000 } }),
        )];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.estimated_cost, 0.0);
    }

    #[test]
    fn non_first_party_cost_fields_are_ignored() {
        let messages = vec![assistant_msg(
            "m1",
            ms(2025, 3, 1),
            "mystery",
            "unknown-model",
            json!({ "cost": 9.99 }),
        )];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.metered_cost, 0.0);
        assert_eq!(stats.estimated_cost, 0.0);
    }

    #[test]
    fn rankings_are_assistant_only_top_3_first_encounter_ties() {
        let mut messages = vec![
            // User messages with attribution must not count.
            user_msg("u1", ms(2025, 3, 1)),
        ];
        let usage: &[(&str, &str, usize)] = &[
            ("alpha", "model-a", 3),
            ("beta", "model-b", 3),
            ("gamma", "model-c", 5),
            ("delta", "model-d", 1),
        ];
        let mut n = 0;
        for (provider, model, count) in usage {
            for _ in 0..*count {
                n += 1;
                messages.push(assistant_msg(
                    &format!("m{n}"),
                    ms(2025, 3, 1) + n,
                    provider,
                    model,
                    json!({}),
                ));
            }
        }
        let stats = compute(&messages, date(2025, 6, 1));

        assert_eq!(stats.top_models.len(), 3);
        let ids: Vec<&str> = stats.top_models.iter().map(|r| r.id.as_str()).collect();
        // model-c leads; model-a beats model-b on the tie because it appeared first.
        assert_eq!(ids, vec!["model-c", "model-a", "model-b"]);
        let counts: Vec<u64> = stats.top_models.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![5, 3, 3]);
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
        // 5 of 12 attributed assistant messages → 42%.
        assert_eq!(stats.top_models[0].percent, 42);

        let provider_ids: Vec<&str> =
            stats.top_providers.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(provider_ids, vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn display_names_resolve_through_the_price_table() {
        let messages = vec![assistant_msg(
            "m1",
            ms(2025, 3, 1),
            "anthropic",
            "claude-sonnet-4",
            json!({}),
        )];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.top_models[0].display_name, "Claude Sonnet 4");
        assert_eq!(stats.top_providers[0].display_name, "Anthropic");
    }

    #[test]
    fn weekday_histogram_ties_go_to_the_earliest_weekday() {
        // 2025-06-04 is a Wednesday, 2025-06-02 a Monday.
        let messages = vec![
            user_msg("m1", ms(2025, 6, 2)),
            user_msg("m2", ms(2025, 6, 4)),
        ];
        let stats = compute(&messages, date(2025, 6, 15));
        assert_eq!(stats.weekday_counts[0], 1);
        assert_eq!(stats.weekday_counts[2], 1);
        assert_eq!(stats.busiest_weekday, Some(0));
    }

    #[test]
    fn busiest_day_tie_goes_to_the_earliest_date() {
        let messages = vec![
            user_msg("m1", ms(2025, 4, 10)),
            user_msg("m2", ms(2025, 4, 10)),
            user_msg("m3", ms(2025, 2, 5)),
            user_msg("m4", ms(2025, 2, 5)),
        ];
        let stats = compute(&messages, date(2025, 6, 1));
        assert_eq!(stats.busiest_day, Some(("2025-02-05".to_string(), 2)));
    }

    #[test]
    fn single_active_day_is_a_streak_of_one() {
        let messages = vec![user_msg("m1", ms(2025, 7, 4))];
        let stats = compute(&messages, date(2025, 8, 1));
        assert_eq!(stats.max_streak, 1);
        assert_eq!(stats.max_streak_days.len(), 1);
    }

    #[test]
    fn empty_year_has_no_streaks_no_busiest() {
        let stats = compute(&[], date(2025, 6, 1));
        assert_eq!(stats.max_streak, 0);
        assert_eq!(stats.current_streak, 0);
        assert!(stats.max_streak_days.is_empty());
        assert_eq!(stats.busiest_day, None);
        assert_eq!(stats.busiest_weekday, None);
        assert_eq!(stats.days_since_first_session, 0);
    }

    #[test]
    fn project_count_is_passed_through() {
        let projects: Vec<ProjectRecord> = vec![
            serde_json::from_value(json!({ "id": "prj_a" })).unwrap(),
            serde_json::from_value(json!({ "id": "prj_b" })).unwrap(),
        ];
        let stats =
            compute_yearly_stats_at(2025, &[], &[], &projects, &price_table(), date(2025, 6, 1));
        assert_eq!(stats.total_projects, 2);
    }

    #[test]
    fn sessions_filter_by_year_but_history_does_not() {
        let sessions = vec![
            session("s1", ms(2023, 1, 15)),
            session("s2", ms(2025, 2, 1)),
        ];
        let stats =
            compute_yearly_stats_at(2025, &sessions, &[], &[], &price_table(), date(2025, 6, 1));
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(
            stats.days_since_first_session,
            (date(2025, 6, 1) - date(2023, 1, 15)).num_days()
        );
    }
}
