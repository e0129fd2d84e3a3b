//! Action definitions: reusable, named action-producing values.
//!
//! A single primitive, [`define_action`], bakes an execution class, action
//! kind, and location into a [`DefinedAction`]. The four canonical flavors
//! are thin wrappers over it. Every definition carries its declared name as
//! `action-name` metadata and as its identity, so repeated invocations are
//! recognized downstream as the same action.

use super::action::{ActionFn, ActionMeta, MetaValue, ACTION_NAME, DOC};
use super::error::{DefinitionError, ScheduleError};
use super::precedence::resolve_metadata;
use super::registrar::schedule;
use super::session::Session;
use super::store::PlanStore;
use super::types::{is_identifier, ActionId, ActionKind, Args, ExecutionClass, Location};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// The three scheduling parameters fixed at definition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flavor {
    pub class: ExecutionClass,
    pub kind: ActionKind,
    pub location: Location,
}

impl Flavor {
    /// Remote script, run in declared order on the target.
    pub const BASH: Flavor = Flavor {
        class: ExecutionClass::InSequence,
        kind: ActionKind::RemoteScript,
        location: Location::Target,
    };

    /// Local function, run in declared order on the origin.
    pub const FUNCTION: Flavor = Flavor {
        class: ExecutionClass::InSequence,
        kind: ActionKind::LocalFunction,
        location: Location::Origin,
    };

    /// Remote script, merged per identity and hoisted ahead of in-sequence work.
    pub const AGGREGATED: Flavor = Flavor {
        class: ExecutionClass::Aggregated,
        kind: ActionKind::RemoteScript,
        location: Location::Target,
    };

    /// Remote script, merged per identity and run after in-sequence work.
    pub const COLLECTED: Flavor = Flavor {
        class: ExecutionClass::Collected,
        kind: ActionKind::RemoteScript,
        location: Location::Target,
    };
}

impl FromStr for Flavor {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bash" => Ok(Self::BASH),
            "function" => Ok(Self::FUNCTION),
            "aggregated" => Ok(Self::AGGREGATED),
            "collected" => Ok(Self::COLLECTED),
            other => Err(DefinitionError::UnknownFlavor(other.to_string())),
        }
    }
}

/// Definition-site options: name, argument list, doc string, extra metadata.
#[derive(Debug, Clone, Default)]
pub struct ActionDecl {
    name: String,
    params: Option<Vec<String>>,
    doc: Option<String>,
    meta: ActionMeta,
}

impl ActionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn params<I, T>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Merge extra metadata into the declaration.
    pub fn meta(mut self, meta: ActionMeta) -> Self {
        self.meta = self.meta.merged(&meta);
        self
    }

    /// Add a precedence relation, e.g. `always-before` some other action.
    pub fn relation<I, T>(self, relation: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        self.meta(ActionMeta::new().relation(relation, ids))
    }
}

/// A reusable action-producing value.
#[derive(Debug, Clone)]
pub struct DefinedAction {
    function: ActionFn,
    params: Vec<String>,
    flavor: Flavor,
}

impl DefinedAction {
    pub fn id(&self) -> &ActionId {
        self.function.id()
    }

    pub fn function(&self) -> &ActionFn {
        &self.function
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn doc(&self) -> Option<&str> {
        self.function.meta().doc()
    }

    /// Register one invocation of this action in the session's current scope.
    pub fn invoke<S: PlanStore>(
        &self,
        session: Session<S>,
        args: Args,
    ) -> Result<Session<S>, ScheduleError> {
        if args.len() != self.params.len() {
            return Err(ScheduleError::ArityMismatch {
                action: self.id().clone(),
                expected: self.params.len(),
                got: args.len(),
            });
        }
        let metadata = resolve_metadata(session.precedence(), &self.function);
        schedule(
            session,
            &self.function,
            metadata,
            args,
            self.flavor.class,
            self.flavor.kind,
            self.flavor.location,
        )
    }
}

impl fmt::Display for DefinedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) [{}, {}, {}]",
            self.id(),
            self.params.join(", "),
            self.flavor.class,
            self.flavor.kind,
            self.flavor.location
        )
    }
}

/// Define an action with fixed scheduling parameters.
pub fn define_action<F>(
    flavor: Flavor,
    decl: ActionDecl,
    body: F,
) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    if decl.name.is_empty() {
        return Err(DefinitionError::EmptyName);
    }
    if !is_identifier(&decl.name) {
        return Err(DefinitionError::InvalidName(decl.name));
    }
    let params = decl
        .params
        .ok_or_else(|| DefinitionError::MissingParams(decl.name.clone()))?;
    let mut seen = HashSet::new();
    for p in &params {
        if !seen.insert(p.as_str()) {
            return Err(DefinitionError::DuplicateParam {
                action: decl.name.clone(),
                param: p.clone(),
            });
        }
    }

    let mut meta = decl.meta;
    if let Some(doc) = decl.doc {
        meta.insert(DOC, MetaValue::Text(doc));
    }
    meta.insert(ACTION_NAME, MetaValue::Text(decl.name.clone()));

    let function = ActionFn::new(decl.name, body).with_meta(meta);
    Ok(DefinedAction {
        function,
        params,
        flavor,
    })
}

/// `(name, args, body)` declaration shape.
pub fn declare<F>(
    flavor: Flavor,
    name: &str,
    params: &[&str],
    body: F,
) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(flavor, ActionDecl::new(name).params(params.iter().copied()), body)
}

/// `(name, args, metadata, body)` declaration shape. The metadata map is
/// merged with `{action-name: name}`.
pub fn declare_with_meta<F>(
    flavor: Flavor,
    name: &str,
    params: &[&str],
    meta: ActionMeta,
    body: F,
) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(
        flavor,
        ActionDecl::new(name).params(params.iter().copied()).meta(meta),
        body,
    )
}

/// In-sequence remote script.
pub fn bash_action<F>(decl: ActionDecl, body: F) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(Flavor::BASH, decl, body)
}

/// In-sequence local function.
pub fn fn_action<F>(decl: ActionDecl, body: F) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(Flavor::FUNCTION, decl, body)
}

/// Aggregated remote script.
pub fn aggregated_action<F>(decl: ActionDecl, body: F) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(Flavor::AGGREGATED, decl, body)
}

/// Collected remote script.
pub fn collected_action<F>(decl: ActionDecl, body: F) -> Result<DefinedAction, DefinitionError>
where
    F: Fn(&[serde_json::Value]) -> Result<String, String> + Send + Sync + 'static,
{
    define_action(Flavor::COLLECTED, decl, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{ALWAYS_AFTER, ALWAYS_BEFORE};
    use crate::core::precedence::Precedence;
    use crate::core::store::{PlanNode, TreePlanStore};
    use serde_json::json;

    fn body(args: &[serde_json::Value]) -> Result<String, String> {
        Ok(format!("echo {}", args.len()))
    }

    fn session() -> Session {
        Session::new(TreePlanStore::new()).for_target("configure", "web1")
    }

    fn descriptors(s: &Session) -> Vec<crate::core::action::ActionDescriptor> {
        let path = s.target_path().unwrap();
        s.store()
            .root(&path)
            .unwrap()
            .children
            .iter()
            .filter_map(PlanNode::as_action)
            .cloned()
            .collect()
    }

    #[test]
    fn test_presets_fix_scheduling_parameters() {
        let cases = [
            (bash_action(ActionDecl::new("b").params(["x"]), body).unwrap(), Flavor::BASH),
            (fn_action(ActionDecl::new("f").params(["x"]), body).unwrap(), Flavor::FUNCTION),
            (
                aggregated_action(ActionDecl::new("a").params(["x"]), body).unwrap(),
                Flavor::AGGREGATED,
            ),
            (
                collected_action(ActionDecl::new("c").params(["x"]), body).unwrap(),
                Flavor::COLLECTED,
            ),
        ];
        for (action, flavor) in cases {
            assert_eq!(action.flavor(), flavor);
        }
        assert_eq!(Flavor::FUNCTION.location, Location::Origin);
        assert_eq!(Flavor::COLLECTED.class, ExecutionClass::Collected);
    }

    #[test]
    fn test_missing_params_is_definition_error() {
        let err = bash_action(ActionDecl::new("install"), body).unwrap_err();
        assert!(matches!(err, DefinitionError::MissingParams(ref n) if n == "install"));
    }

    #[test]
    fn test_empty_params_is_allowed() {
        let a = bash_action(ActionDecl::new("reboot").params(Vec::<String>::new()), body).unwrap();
        assert!(a.params().is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            declare(Flavor::BASH, "", &[], body),
            Err(DefinitionError::EmptyName)
        ));
        assert!(matches!(
            declare(Flavor::BASH, "two words", &[], body),
            Err(DefinitionError::InvalidName(_))
        ));
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let err = declare(Flavor::BASH, "cp", &["path", "path"], body).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateParam { .. }));
    }

    #[test]
    fn test_declare_attaches_action_name() {
        let a = declare(Flavor::BASH, "install", &["pkg"], body).unwrap();
        assert_eq!(a.function().meta().name(), Some("install"));
        assert_eq!(a.id().as_str(), "install");
    }

    #[test]
    fn test_declare_with_meta_merges_name_over_user_meta() {
        let meta = ActionMeta::new()
            .text(ACTION_NAME, "spoofed")
            .relation(ALWAYS_BEFORE, ["svc"]);
        let a = declare_with_meta(Flavor::AGGREGATED, "pkg", &["p"], meta, body).unwrap();
        assert_eq!(a.function().meta().name(), Some("pkg"));
        let rel = Precedence::from_meta(a.function().meta());
        assert!(rel.get(ALWAYS_BEFORE).unwrap().contains(&ActionId::new("svc")));
    }

    #[test]
    fn test_doc_string_attached() {
        let a = bash_action(
            ActionDecl::new("motd").params(["text"]).doc("Write /etc/motd"),
            body,
        )
        .unwrap();
        assert_eq!(a.doc(), Some("Write /etc/motd"));
    }

    #[test]
    fn test_invoke_registers_with_baked_flavor() {
        let a = aggregated_action(ActionDecl::new("pkg").params(["name"]), body).unwrap();
        let s = a.invoke(session(), vec![json!("curl")]).unwrap();
        let d = &descriptors(&s)[0];
        assert_eq!(d.class(), ExecutionClass::Aggregated);
        assert_eq!(d.kind(), ActionKind::RemoteScript);
        assert_eq!(d.location(), Location::Target);
        assert_eq!(d.function(), a.function());
    }

    #[test]
    fn test_invoke_merges_intrinsic_and_ambient_precedence() {
        let a = bash_action(
            ActionDecl::new("cfg")
                .params(Vec::<String>::new())
                .relation(ALWAYS_AFTER, ["pkg"]),
            body,
        )
        .unwrap();
        let ctx = Precedence::new().with(ALWAYS_AFTER, ["repo"]);
        let s = session()
            .with_precedence(&ctx, |s| a.invoke(s, vec![]))
            .unwrap();
        let d = &descriptors(&s)[0];
        let after = d.metadata().get(ALWAYS_AFTER).unwrap();
        assert!(after.contains(&ActionId::new("pkg")));
        assert!(after.contains(&ActionId::new("repo")));
    }

    #[test]
    fn test_invoke_arity_mismatch() {
        let a = bash_action(ActionDecl::new("cp").params(["src", "dst"]), body).unwrap();
        let err = a.invoke(session(), vec![json!("a")]).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::ArityMismatch {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_identity_stable_across_invocations() {
        let x = aggregated_action(ActionDecl::new("x").params(["n"]), body).unwrap();
        let y = bash_action(ActionDecl::new("y").params(Vec::<String>::new()), body).unwrap();
        let s = x.invoke(session(), vec![json!(1)]).unwrap();
        let s = y.invoke(s, vec![]).unwrap();
        let s = x.invoke(s, vec![json!(2)]).unwrap();
        let ds = descriptors(&s);
        assert_eq!(ds[0].function(), ds[2].function());
        assert_ne!(ds[0].function(), ds[1].function());
    }

    #[test]
    fn test_repeated_relation_is_unioned() {
        let a = bash_action(
            ActionDecl::new("cfg")
                .params(["path"])
                .relation(ALWAYS_AFTER, ["pkg"])
                .relation(ALWAYS_AFTER, ["repo"]),
            body,
        )
        .unwrap();
        let p = Precedence::from_meta(a.function().meta());
        let after: Vec<_> = p.get(ALWAYS_AFTER).unwrap().iter().map(|i| i.as_str()).collect();
        assert_eq!(after, vec!["pkg", "repo"]);
    }

    #[test]
    fn test_define_action_custom_flavor() {
        let upload = Flavor {
            class: ExecutionClass::InSequence,
            kind: ActionKind::TransferToTarget,
            location: Location::Origin,
        };
        let decl = ActionDecl::new("upload").params(["src", "dst"]);
        let a = define_action(upload, decl, body).unwrap();
        let s = a
            .invoke(session(), vec![json!("./app.tar"), json!("/opt/app.tar")])
            .unwrap();
        let ds = descriptors(&s);
        assert_eq!(ds[0].kind(), ActionKind::TransferToTarget);
        assert_eq!(ds[0].location(), Location::Origin);
    }

    #[test]
    fn test_flavor_from_str() {
        assert_eq!("bash".parse::<Flavor>().unwrap(), Flavor::BASH);
        assert_eq!("collected".parse::<Flavor>().unwrap(), Flavor::COLLECTED);
        assert!(matches!(
            "parallel".parse::<Flavor>(),
            Err(DefinitionError::UnknownFlavor(_))
        ));
    }

    #[test]
    fn test_display() {
        let a = declare(Flavor::BASH, "cp", &["src", "dst"], body).unwrap();
        assert_eq!(a.to_string(), "cp(src, dst) [in-sequence, remote-script, target]");
    }
}
