//! Resolves the rule table against an inbound request.

use crate::carrier::TrackedValue;
use crate::inbound::InboundRequest;
use crate::rule::Rule;

/// Resolves every rule against the inbound request, in rule order.
///
/// For each rule the inbound value is read first. When it is absent or empty and the rule has a
/// fallback, the fallback is called exactly once with the outbound name and the inbound request.
/// A rule whose final value is empty produces nothing. A panicking fallback is not caught.
///
/// Rules resolve independently of each other: fallbacks never see values resolved by other
/// rules.
pub fn bind(inbound: &InboundRequest<'_>, rules: &[Rule]) -> Vec<TrackedValue> {
    rules
        .iter()
        .filter_map(|rule| resolve(inbound, rule))
        .collect()
}

fn resolve(inbound: &InboundRequest<'_>, rule: &Rule) -> Option<TrackedValue> {
    let value = match inbound.lookup(rule.inbound_location(), rule.inbound_name()) {
        Some(value) => value,
        None => match rule.fallback() {
            Some(fallback) => fallback(rule.outbound_name(), inbound),
            None => return None,
        },
    };

    if value.is_empty() {
        return None;
    }

    Some(TrackedValue::new(
        rule.outbound_location(),
        rule.outbound_name(),
        value,
    ))
}
