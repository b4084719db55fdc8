use crate::hook::{AccessHookKind, HOOK_MAX};

/// A rule is a value, not a trait object or a subclass — the four cases below
/// are the entire rule vocabulary the rest of the system ever needs to
/// dispatch on, in one place (the rule engine in the `pulse-access-rules`
/// crate).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rule {
    Allow,
    Block,
    CheckOwner,
    CheckPortal,
}

/// `{ index, rule_by_hook }` from the spec. Immutable once installed into a
/// [`PolicyTable`]; policies are only ever appended, never removed, so an
/// index handed out by `create_policy` stays valid for the table's lifetime.
#[derive(Clone, Debug)]
pub struct Policy {
    index: u32,
    rule_by_hook: [Rule; HOOK_MAX],
}

impl Policy {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn rule(&self, hook: AccessHookKind) -> Rule {
        self.rule_by_hook[hook.index()]
    }
}

/// Read-only-after-init registry of policies, shared by reference between the
/// hook orchestrator and the rule engine.
#[derive(Default, Debug)]
pub struct PolicyTable {
    policies: Vec<Policy>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new policy whose rule table starts out entirely
    /// `default_rule`, returning its stable index.
    pub fn create_policy(&mut self, default_rule: Rule) -> u32 {
        let index = self.policies.len() as u32;

        self.policies.push(Policy {
            index,
            rule_by_hook: [default_rule; HOOK_MAX],
        });

        index
    }

    /// Overwrite the rule for one hook kind on an existing policy.
    ///
    /// # Panics
    /// Panics if `policy_index` doesn't name a policy created by this table;
    /// this only happens for a programming error at init time, never as a
    /// result of any client-controlled input.
    pub fn set_rule(&mut self, policy_index: u32, hook: AccessHookKind, rule: Rule) {
        let policy = &mut self.policies[policy_index as usize];
        policy.rule_by_hook[hook.index()] = rule;
    }

    #[inline]
    pub fn get_rule(&self, policy_index: u32, hook: AccessHookKind) -> Option<Rule> {
        self.policies
            .get(policy_index as usize)
            .map(|policy| policy.rule(hook))
    }

    #[inline]
    pub fn get(&self, policy_index: u32) -> Option<&Policy> {
        self.policies.get(policy_index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_policy_returns_stable_dense_indices() {
        let mut table = PolicyTable::new();

        let a = table.create_policy(Rule::Allow);
        let b = table.create_policy(Rule::Block);

        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.get_rule(a, AccessHookKind::GetSinkInfo), Some(Rule::Allow));
        assert_eq!(table.get_rule(b, AccessHookKind::GetSinkInfo), Some(Rule::Block));
    }

    #[test]
    fn set_rule_overrides_a_single_hook() {
        let mut table = PolicyTable::new();
        let portal = table.create_policy(Rule::Allow);

        table.set_rule(portal, AccessHookKind::ConnectPlayback, Rule::CheckPortal);

        assert_eq!(
            table.get_rule(portal, AccessHookKind::ConnectPlayback),
            Some(Rule::CheckPortal)
        );
        assert_eq!(
            table.get_rule(portal, AccessHookKind::GetSinkInfo),
            Some(Rule::Allow)
        );
    }

    #[test]
    fn get_rule_for_unknown_policy_is_none() {
        let table = PolicyTable::new();

        assert_eq!(table.get_rule(0, AccessHookKind::Stat), None);
    }
}
