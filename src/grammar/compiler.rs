//! Grammar compiler
//!
//! A one-shot validation and annotation pass over a [`Grammar`], run before
//! any input is matched:
//!
//! 1. assign dense node ids depth-first
//! 2. index rulesets, rejecting duplicate names and a missing or repeated
//!    `return`
//! 3. resolve rule references and check every ruleset is reachable
//! 4. lay out capture slots per rule; all alternatives must agree
//! 5. intern terminals into precompiled matchers
//! 6. infer which patterns can fail, and derive warnings from that
//! 7. validate output templates and constants
//!
//! Any violation is a fatal [`GrammarError`]. Warnings never fail
//! compilation.

use super::terminal::{Terminal, TerminalTable};
use super::{
    Descriptor, Grammar, ObjectMember, PatternNode, RulesetNode, TokenNode, ValueKind, ValueNode,
    RETURN_RULESET,
};
use crate::error::GrammarError;
use crate::parser::Callbacks;
use crate::source_location::SourcePosition;
use crate::value::Value;
use hashbrown::HashSet;
use std::collections::VecDeque;
use std::fmt;

/// Kind of grammar warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// An alternative follows one that can never fail
    UnreachableAlternative,
    /// A ruleset can reach itself without consuming input
    ///
    /// Supported through seed growing; reported for information.
    LeftRecursion,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableAlternative => write!(f, "unreachable alternative"),
            Self::LeftRecursion => write!(f, "left recursion"),
        }
    }
}

/// A non-fatal finding of the grammar compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Ruleset the warning was found in
    pub ruleset: String,
    /// Human-readable message
    pub message: String,
    /// Grammar position, when known
    pub pos: Option<SourcePosition>,
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.ruleset, self.kind, self.message)?;
        if let Some(pos) = self.pos {
            write!(f, " at {}", pos)?;
        }
        Ok(())
    }
}

/// A validated, annotated grammar ready for the op compiler
#[derive(Debug)]
pub struct CompiledGrammar {
    /// The grammar with all annotation fields filled in
    pub grammar: Grammar,
    /// Interned terminals, indexed by the `terminal` annotations
    pub terminals: Vec<Terminal>,
    /// Index of the `return` ruleset
    pub return_index: usize,
    /// Non-fatal findings
    pub warnings: Vec<GrammarWarning>,
}

/// Compile `grammar` against the configured callbacks
pub fn compile(grammar: Grammar, callbacks: &Callbacks) -> Result<CompiledGrammar, GrammarError> {
    GrammarCompiler::new(callbacks).compile(grammar)
}

/// Where a template is evaluated, which decides what it may reference
enum TemplateScope<'a> {
    Rule { arity: usize },
    Constant { name: &'a str, defined: &'a HashSet<String> },
}

/// Grammar compiler state
pub struct GrammarCompiler<'a> {
    callbacks: &'a Callbacks,
    next_id: usize,
    terminals: TerminalTable,
    warnings: Vec<GrammarWarning>,
}

impl<'a> GrammarCompiler<'a> {
    /// Create a compiler that resolves calls against `callbacks`
    pub fn new(callbacks: &'a Callbacks) -> Self {
        Self {
            callbacks,
            next_id: 0,
            terminals: TerminalTable::new(),
            warnings: Vec::new(),
        }
    }

    /// Validate and annotate `grammar`
    pub fn compile(mut self, mut grammar: Grammar) -> Result<CompiledGrammar, GrammarError> {
        self.assign_ids(&mut grammar);
        let return_index = index_rulesets(&mut grammar)?;
        resolve_references(&mut grammar)?;
        check_reachable(&grammar, return_index)?;

        for ruleset in &mut grammar.rulesets {
            let name = ruleset.name.clone();
            for rule in &mut ruleset.rules {
                rule.captures = layout_alternatives(&mut rule.patterns, 1, false, &name, rule.pos)?;
            }
        }

        for ruleset in &mut grammar.rulesets {
            for rule in &mut ruleset.rules {
                intern_terminals(&mut rule.patterns, &mut self.terminals)?;
            }
        }

        for ruleset in &mut grammar.rulesets {
            for rule in &mut ruleset.rules {
                infer_can_fail(&mut rule.patterns);
            }
        }
        self.warn_unreachable_alternatives(&grammar);
        self.warn_left_recursion(&grammar);

        self.check_vars(&grammar)?;
        let var_names: HashSet<String> = grammar.vars.iter().map(|v| v.name.clone()).collect();
        for ruleset in &grammar.rulesets {
            for rule in &ruleset.rules {
                if let Some(output) = &rule.output {
                    let scope = TemplateScope::Rule {
                        arity: rule.captures.len(),
                    };
                    self.check_template(output, &scope, &var_names, false, rule.pos)?;
                }
            }
        }

        log_debug!(
            "compiled grammar: {} rulesets, {} nodes, {} terminals, {} warnings",
            grammar.rulesets.len(),
            grammar.max_id,
            self.terminals.len(),
            self.warnings.len()
        );
        #[cfg(feature = "logging")]
        for warning in &self.warnings {
            log_debug!("grammar warning: {}", warning);
        }

        Ok(CompiledGrammar {
            grammar,
            terminals: self.terminals.into_vec(),
            return_index,
            warnings: self.warnings,
        })
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn assign_ids(&mut self, grammar: &mut Grammar) {
        for ruleset in &mut grammar.rulesets {
            ruleset.id = self.next_id();
            for rule in &mut ruleset.rules {
                rule.id = self.next_id();
                self.assign_pattern_ids(&mut rule.patterns);
            }
        }
        grammar.max_id = self.next_id;
    }

    fn assign_pattern_ids(&mut self, patterns: &mut [PatternNode]) {
        for pattern in patterns {
            pattern.id = self.next_id();
            for token in &mut pattern.tokens {
                token.id = self.next_id();
                if let Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } =
                    &mut token.descriptor
                {
                    self.assign_pattern_ids(patterns);
                }
            }
        }
    }

    fn warn_unreachable_alternatives(&mut self, grammar: &Grammar) {
        for ruleset in &grammar.rulesets {
            let mut shadowed = false;
            let mut index = 0;
            for rule in &ruleset.rules {
                for pattern in &rule.patterns {
                    if shadowed {
                        self.warnings.push(GrammarWarning {
                            kind: WarningKind::UnreachableAlternative,
                            ruleset: ruleset.name.clone(),
                            message: format!(
                                "alternative {} follows an alternative that cannot fail",
                                index + 1
                            ),
                            pos: rule.pos,
                        });
                    }
                    shadowed |= !pattern.can_fail;
                    index += 1;
                    self.warn_nested_choices(&ruleset.name, &pattern.tokens);
                }
            }
        }
    }

    fn warn_nested_choices(&mut self, ruleset: &str, tokens: &[TokenNode]) {
        for token in tokens {
            let Some(patterns) = token.descriptor.patterns() else {
                continue;
            };
            if let Some(blocker) = patterns.iter().position(|p| !p.can_fail) {
                if blocker + 1 < patterns.len() {
                    self.warnings.push(GrammarWarning {
                        kind: WarningKind::UnreachableAlternative,
                        ruleset: ruleset.to_string(),
                        message: format!(
                            "{} option(s) after option {} of a nested choice can never match",
                            patterns.len() - blocker - 1,
                            blocker + 1
                        ),
                        pos: token.pos,
                    });
                }
            }
            for pattern in patterns {
                self.warn_nested_choices(ruleset, &pattern.tokens);
            }
        }
    }

    fn warn_left_recursion(&mut self, grammar: &Grammar) {
        let nullable = nullable_rulesets(&grammar.rulesets);
        let leading: Vec<Vec<usize>> = grammar
            .rulesets
            .iter()
            .map(|ruleset| {
                let mut out = Vec::new();
                for rule in &ruleset.rules {
                    leading_calls(&rule.patterns, &nullable, &mut out);
                }
                out
            })
            .collect();

        for (idx, ruleset) in grammar.rulesets.iter().enumerate() {
            if reaches(&leading, idx, idx) {
                self.warnings.push(GrammarWarning {
                    kind: WarningKind::LeftRecursion,
                    ruleset: ruleset.name.clone(),
                    message: format!(
                        "`{}` can reach itself without consuming input",
                        ruleset.name
                    ),
                    pos: ruleset.pos,
                });
            }
        }
    }

    fn check_vars(&self, grammar: &Grammar) -> Result<(), GrammarError> {
        let mut defined = HashSet::new();
        for var in &grammar.vars {
            if defined.contains(&var.name) {
                return Err(GrammarError::DuplicateVar {
                    name: var.name.clone(),
                    pos: var.pos,
                });
            }
            let scope = TemplateScope::Constant {
                name: &var.name,
                defined: &defined,
            };
            self.check_template(&var.value, &scope, &defined, false, var.pos)?;
            defined.insert(var.name.clone());
        }
        Ok(())
    }

    fn check_template(
        &self,
        node: &ValueNode,
        scope: &TemplateScope<'_>,
        vars: &HashSet<String>,
        spread_ok: bool,
        fallback: Option<SourcePosition>,
    ) -> Result<(), GrammarError> {
        let pos = node.pos.or(fallback);

        match &node.kind {
            ValueKind::Literal { value } => {
                if !node.access.is_empty() {
                    super::template::apply_access(value.clone(), &node.access).map_err(|e| {
                        GrammarError::InvalidAccess {
                            reason: e.to_string(),
                            pos,
                        }
                    })?;
                }
            }
            ValueKind::BackRef { index, .. } => match scope {
                TemplateScope::Rule { arity } => {
                    if index > arity {
                        return Err(GrammarError::BackRefOutOfRange {
                            index: *index,
                            arity: *arity,
                            pos,
                        });
                    }
                }
                TemplateScope::Constant { name, .. } => {
                    return Err(GrammarError::InvalidConstant {
                        name: name.to_string(),
                        reason: format!("backreference ${} has no match to refer to", index),
                    });
                }
            },
            ValueKind::VarRef { name } => {
                let known = match scope {
                    TemplateScope::Rule { .. } => vars.contains(name),
                    TemplateScope::Constant { defined, .. } => defined.contains(name),
                };
                if !known {
                    return Err(GrammarError::UnresolvedVar {
                        name: name.clone(),
                        pos,
                    });
                }
            }
            ValueKind::MetaRef { meta } => {
                if let TemplateScope::Constant { name, .. } = scope {
                    return Err(GrammarError::InvalidConstant {
                        name: name.to_string(),
                        reason: format!("match {:?} is not available in constants", meta)
                            .to_lowercase(),
                    });
                }
            }
            ValueKind::Spread { inner } => {
                if !spread_ok {
                    return Err(GrammarError::InvalidSpread {
                        reason: "spread is only allowed inside an array, object or call".to_string(),
                        pos,
                    });
                }
                if !node.access.is_empty() {
                    return Err(GrammarError::InvalidAccess {
                        reason: "cannot access into a spread".to_string(),
                        pos,
                    });
                }
                if let Some(value) = literal_of(inner) {
                    if !matches!(
                        value,
                        Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_)
                    ) {
                        return Err(GrammarError::InvalidSpread {
                            reason: format!("cannot spread a {} literal", value.kind_name()),
                            pos,
                        });
                    }
                }
                self.check_template(inner, scope, vars, false, pos)?;
            }
            ValueKind::Object { members } => {
                for member in members {
                    match member {
                        ObjectMember::Pair { value, .. } => {
                            self.check_template(value, scope, vars, false, pos)?;
                        }
                        ObjectMember::Spread { value } => {
                            if let Some(literal) = literal_of(value) {
                                if !matches!(literal, Value::Null | Value::Array(_) | Value::Object(_)) {
                                    return Err(GrammarError::InvalidSpread {
                                        reason: format!(
                                            "cannot spread a {} literal into an object",
                                            literal.kind_name()
                                        ),
                                        pos: value.pos.or(pos),
                                    });
                                }
                            }
                            self.check_template(value, scope, vars, false, pos)?;
                        }
                    }
                }
            }
            ValueKind::Array { items } => {
                for item in items {
                    self.check_template(item, scope, vars, true, pos)?;
                }
            }
            ValueKind::Call { name, args } => {
                if !self.callbacks.contains_key(name) {
                    return Err(GrammarError::UnknownCallback {
                        name: name.clone(),
                        pos,
                    });
                }
                for arg in args {
                    self.check_template(arg, scope, vars, true, pos)?;
                }
            }
            ValueKind::Pivot { inner } => {
                self.check_template(inner, scope, vars, false, pos)?;
            }
        }
        Ok(())
    }
}

fn literal_of(node: &ValueNode) -> Option<&Value> {
    match &node.kind {
        ValueKind::Literal { value } if node.access.is_empty() => Some(value),
        _ => None,
    }
}

/// Build the name lookup and locate `return`
fn index_rulesets(grammar: &mut Grammar) -> Result<usize, GrammarError> {
    let mut return_index = None;
    for (idx, ruleset) in grammar.rulesets.iter().enumerate() {
        if ruleset.name == RETURN_RULESET {
            if return_index.is_some() {
                return Err(GrammarError::MultipleReturn { pos: ruleset.pos });
            }
            return_index = Some(idx);
        }
    }

    grammar.lookup.clear();
    for (idx, ruleset) in grammar.rulesets.iter().enumerate() {
        if grammar.lookup.insert(ruleset.name.clone(), idx).is_some() {
            return Err(GrammarError::DuplicateRuleset {
                name: ruleset.name.clone(),
                pos: ruleset.pos,
            });
        }
    }

    return_index.ok_or(GrammarError::MissingReturn)
}

fn resolve_references(grammar: &mut Grammar) -> Result<(), GrammarError> {
    let Grammar {
        rulesets, lookup, ..
    } = grammar;
    for ruleset in rulesets.iter_mut() {
        for rule in &mut ruleset.rules {
            visit_tokens_mut(&mut rule.patterns, &mut |token| {
                if let Descriptor::RuleRef { name, target } = &mut token.descriptor {
                    match lookup.get(name.as_str()) {
                        Some(&idx) => *target = Some(idx),
                        None => {
                            return Err(GrammarError::UnresolvedRule {
                                name: name.clone(),
                                pos: token.pos,
                            })
                        }
                    }
                }
                Ok(())
            })?;
        }
    }
    Ok(())
}

fn check_reachable(grammar: &Grammar, return_index: usize) -> Result<(), GrammarError> {
    let mut seen = vec![false; grammar.rulesets.len()];
    let mut queue = VecDeque::from([return_index]);
    seen[return_index] = true;

    while let Some(idx) = queue.pop_front() {
        for rule in &grammar.rulesets[idx].rules {
            visit_tokens(&rule.patterns, &mut |token| {
                if let Descriptor::RuleRef {
                    target: Some(target),
                    ..
                } = token.descriptor
                {
                    if !seen[target] {
                        seen[target] = true;
                        queue.push_back(target);
                    }
                }
            });
        }
    }

    match seen.iter().position(|&s| !s) {
        Some(idx) => {
            let ruleset = &grammar.rulesets[idx];
            Err(GrammarError::UnreachableRuleset {
                name: ruleset.name.clone(),
                pos: ruleset.pos,
            })
        }
        None => Ok(()),
    }
}

/// Assign capture slots to a choice; every alternative must produce the
/// same layout as the first
fn layout_alternatives(
    patterns: &mut [PatternNode],
    first_slot: usize,
    repeated: bool,
    ruleset: &str,
    pos: Option<SourcePosition>,
) -> Result<Vec<bool>, GrammarError> {
    let mut expected: Option<Vec<bool>> = None;
    for pattern in patterns.iter_mut() {
        let mut layout = Vec::new();
        layout_pattern(pattern, first_slot, repeated, ruleset, pos, &mut layout)?;
        match &expected {
            None => expected = Some(layout),
            Some(first) if *first != layout => {
                return Err(GrammarError::CaptureCountMismatch {
                    ruleset: ruleset.to_string(),
                    expected: first.len(),
                    found: layout.len(),
                    pos: pattern.tokens.first().and_then(|t| t.pos).or(pos),
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected.unwrap_or_default())
}

fn layout_pattern(
    pattern: &mut PatternNode,
    first_slot: usize,
    repeated: bool,
    ruleset: &str,
    pos: Option<SourcePosition>,
    out: &mut Vec<bool>,
) -> Result<(), GrammarError> {
    for token in &mut pattern.tokens {
        let repeated = repeated || token.repeat;
        let pos = token.pos.or(pos);
        match &mut token.descriptor {
            Descriptor::Capture { patterns, slot } => {
                *slot = first_slot + out.len();
                out.push(repeated);
                let inner = layout_alternatives(patterns, *slot + 1, repeated, ruleset, pos)?;
                out.extend(inner);
            }
            Descriptor::Group { patterns } => {
                let inner =
                    layout_alternatives(patterns, first_slot + out.len(), repeated, ruleset, pos)?;
                out.extend(inner);
            }
            _ => {}
        }
    }
    Ok(())
}

fn intern_terminals(
    patterns: &mut [PatternNode],
    table: &mut TerminalTable,
) -> Result<(), GrammarError> {
    visit_tokens_mut(patterns, &mut |token| {
        match &mut token.descriptor {
            Descriptor::String { value, terminal } => *terminal = Some(table.literal(value)),
            Descriptor::Class {
                ranges,
                negated,
                terminal,
            } => {
                let id = table.class(ranges, *negated).map_err(|bad| GrammarError::InvalidClass {
                    from: bad.from,
                    to: bad.to,
                    pos: token.pos,
                })?;
                *terminal = Some(id);
            }
            Descriptor::Any { terminal } => *terminal = Some(table.any()),
            _ => {}
        }
        Ok(())
    })
}

/// Best-effort: a pattern cannot fail when every token it requires always
/// matches without input
fn infer_can_fail(patterns: &mut [PatternNode]) {
    for pattern in patterns {
        for token in &mut pattern.tokens {
            if let Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } =
                &mut token.descriptor
            {
                infer_can_fail(patterns);
            }
        }
        pattern.can_fail = pattern.tokens.iter().any(token_can_fail);
    }
}

fn token_can_fail(token: &TokenNode) -> bool {
    if token.not {
        return true;
    }
    if !token.required {
        return false;
    }
    match &token.descriptor {
        Descriptor::String { value, .. } => !value.is_empty(),
        Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } => {
            patterns.iter().all(|p| p.can_fail)
        }
        Descriptor::RuleRef { .. } | Descriptor::Class { .. } | Descriptor::Any { .. } => true,
    }
}

/// Rulesets that can match without consuming input (fixed point)
fn nullable_rulesets(rulesets: &[RulesetNode]) -> Vec<bool> {
    let mut nullable = vec![false; rulesets.len()];
    loop {
        let mut changed = false;
        for (idx, ruleset) in rulesets.iter().enumerate() {
            if nullable[idx] {
                continue;
            }
            let now = ruleset
                .rules
                .iter()
                .any(|rule| rule.patterns.iter().any(|p| pattern_nullable(p, &nullable)));
            if now {
                nullable[idx] = true;
                changed = true;
            }
        }
        if !changed {
            return nullable;
        }
    }
}

fn pattern_nullable(pattern: &PatternNode, nullable: &[bool]) -> bool {
    pattern.tokens.iter().all(|t| token_nullable(t, nullable))
}

fn token_nullable(token: &TokenNode, nullable: &[bool]) -> bool {
    if !token.required || token.is_predicate() {
        return true;
    }
    match &token.descriptor {
        Descriptor::String { value, .. } => value.is_empty(),
        Descriptor::Class { .. } | Descriptor::Any { .. } => false,
        Descriptor::RuleRef { target, .. } => target.is_some_and(|t| nullable[t]),
        Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } => {
            patterns.iter().any(|p| pattern_nullable(p, nullable))
        }
    }
}

/// Rulesets called at the leading position of any of `patterns`
fn leading_calls(patterns: &[PatternNode], nullable: &[bool], out: &mut Vec<usize>) {
    for pattern in patterns {
        for token in &pattern.tokens {
            match &token.descriptor {
                Descriptor::RuleRef {
                    target: Some(target),
                    ..
                } => out.push(*target),
                Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } => {
                    leading_calls(patterns, nullable, out)
                }
                _ => {}
            }
            if !token_nullable(token, nullable) {
                break;
            }
        }
    }
}

fn reaches(edges: &[Vec<usize>], from: usize, target: usize) -> bool {
    let mut seen = vec![false; edges.len()];
    let mut stack: Vec<usize> = edges[from].clone();
    while let Some(idx) = stack.pop() {
        if idx == target {
            return true;
        }
        if !std::mem::replace(&mut seen[idx], true) {
            stack.extend_from_slice(&edges[idx]);
        }
    }
    false
}

fn visit_tokens_mut(
    patterns: &mut [PatternNode],
    f: &mut dyn FnMut(&mut TokenNode) -> Result<(), GrammarError>,
) -> Result<(), GrammarError> {
    for pattern in patterns {
        for token in &mut pattern.tokens {
            f(token)?;
            if let Descriptor::Capture { patterns, .. } | Descriptor::Group { patterns } =
                &mut token.descriptor
            {
                visit_tokens_mut(patterns, f)?;
            }
        }
    }
    Ok(())
}

fn visit_tokens(patterns: &[PatternNode], f: &mut dyn FnMut(&TokenNode)) {
    for pattern in patterns {
        for token in &pattern.tokens {
            f(token);
            if let Some(nested) = token.descriptor.patterns() {
                visit_tokens(nested, f);
            }
        }
    }
}

/// Count nodes by visiting every ruleset, rule, pattern and token
#[cfg(test)]
fn count_nodes(grammar: &Grammar) -> usize {
    fn patterns(p: &[PatternNode]) -> usize {
        p.iter()
            .map(|p| {
                1 + p.tokens.len()
                    + p.tokens
                        .iter()
                        .filter_map(|t| t.descriptor.patterns())
                        .map(patterns)
                        .sum::<usize>()
            })
            .sum()
    }
    grammar
        .rulesets
        .iter()
        .map(|r| 1 + r.rules.iter().map(|rule| 1 + patterns(&rule.patterns)).sum::<usize>())
        .sum()
}
