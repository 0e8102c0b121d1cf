//! Class wrapping: allocator, methods, class interfaces and properties.

use std::collections::BTreeMap;

use shimgen_types::ast::{Attribute, ClassDef, FunctionArgument, FunctionResult, MethodRole};
use shimgen_types::bind_c::{
    BindCClass, BindCClassProperty, BindCFunction, BindCResult, Expr, Local, MemberKey, Origin,
    ResultAbi, ScopeId, Stmt,
};
use tracing::debug;

use crate::argument::{classify_argument, ArgumentKind, MarshaledArgument};
use crate::error::{WrapError, WrapResult};
use crate::function::FunctionJob;
use crate::module::{collect_interface, Wrapper};
use crate::result::{classify_result, ResultKind, ResultSource};
use crate::scope::ScopeKind;

impl Wrapper<'_> {
    pub(crate) fn wrap_class(&mut self, class: &ClassDef) -> BindCClass {
        let allocator = self.class_allocator(class);

        // Overloads of a class interface are invoked through the interface.
        let routed: BTreeMap<&str, &str> = class
            .interfaces
            .iter()
            .flat_map(|i| i.functions.iter().map(move |f| (f.as_str(), i.name.as_str())))
            .collect();

        let mut wrapped_methods: Vec<(MethodRole, BindCFunction)> = Vec::new();
        let mut wrapped: BTreeMap<&str, String> = BTreeMap::new();
        for method in class.methods.iter().filter(|m| !m.is_private) {
            let job = FunctionJob {
                def: method,
                wrapper_hint: format!("bind_c_{}_{}", class.name, method.name),
                origin: Origin::Method(MemberKey::new(&class.name, &method.name)),
                call_name: routed.get(method.name.as_str()).copied().unwrap_or(method.name.as_str()),
            };
            match self.wrap_function(job) {
                Ok(f) => {
                    wrapped.insert(method.name.as_str(), f.name.clone());
                    wrapped_methods.push((method.role, f));
                }
                Err(err) => {
                    let symbol = format!("{}.{}", class.name, method.name);
                    self.report(&err, Some(&symbol), method.span);
                }
            }
        }

        let interfaces = class
            .interfaces
            .iter()
            .filter_map(|i| collect_interface(i, &wrapped))
            .collect();

        let mut methods = Vec::new();
        let mut properties = Vec::new();
        for (role, f) in wrapped_methods {
            if role == MethodRole::Property {
                let member = match &f.origin {
                    Origin::Method(key) => key.member.clone(),
                    _ => f.name.clone(),
                };
                properties.push(BindCClassProperty {
                    key: MemberKey::new(&class.name, member),
                    docstring: f.docstring.clone(),
                    getter: f,
                    setter: None,
                });
            } else {
                methods.push(f);
            }
        }

        for attr in class.attributes.iter().filter(|a| !a.is_private) {
            if properties.iter().any(|p| p.key.member == attr.name) {
                continue;
            }
            let symbol = format!("{}.{}", class.name, attr.name);
            if attr.ty.is_tuple() {
                let err = WrapError::UnsupportedAttribute {
                    class: class.name.clone(),
                    attribute: attr.name.clone(),
                    ty: attr.ty.to_string(),
                };
                self.report(&err, Some(&symbol), class.span);
                continue;
            }
            match self.wrap_attribute(class, attr) {
                Ok(p) => properties.push(p),
                Err(err) => self.report(&err, Some(&symbol), class.span),
            }
        }

        debug!(
            class = %class.name,
            allocator = %allocator.name,
            methods = methods.len(),
            properties = properties.len(),
            "wrapped class"
        );

        BindCClass {
            name: class.name.clone(),
            allocator,
            methods,
            interfaces,
            properties,
            docstring: class.docstring.clone(),
        }
    }

    /// Parameterless constructor returning a handle to a fresh instance.
    fn class_allocator(&mut self, class: &ClassDef) -> BindCFunction {
        let root = self.scopes.root();
        let name = self
            .scopes
            .fresh_name(root, &format!("{}_bind_c_alloc", class.name).to_lowercase());
        let scope = self.scopes.new_child(root, &name, ScopeKind::Function);

        let obj = self.scopes.fresh_name(scope, &format!("{}_obj", class.name));
        let local = Local::alias(obj.clone(), class.class_type());
        self.scopes.insert_variable(scope, local.clone());
        let bind = self.scopes.fresh_name(scope, &format!("bound_{}", class.name));

        let body = vec![
            Stmt::Allocate {
                var: obj.clone(),
                shape: Vec::new(),
            },
            Stmt::CLoc {
                source: obj.clone(),
                ptr: bind.clone(),
            },
        ];

        BindCFunction {
            name,
            origin: Origin::Allocator(class.name.clone()),
            arguments: Vec::new(),
            results: vec![BindCResult {
                original: FunctionResult::new(obj, class.class_type()),
                local,
                abi: ResultAbi::Pointer {
                    ptr: bind,
                    shape: Vec::new(),
                },
            }],
            body,
            locals: self.scopes.locals(scope),
            scope,
            docstring: None,
        }
    }

    /// Getter and setter of one public attribute.
    fn wrap_attribute(&mut self, class: &ClassDef, attr: &Attribute) -> WrapResult<BindCClassProperty> {
        let key = MemberKey::new(&class.name, &attr.name);
        let getter_label = format!("{}_{}_getter", class.name, attr.name).to_lowercase();
        let setter_label = format!("{}_{}_setter", class.name, attr.name).to_lowercase();

        let mut value = FunctionResult::new(&attr.name, attr.ty.clone());
        value.is_alias = attr.is_alias;
        let new_value = FunctionArgument::new(&attr.name, attr.ty.clone());
        let result_kind = classify_result(&getter_label, &value)?;
        let arg_kind = classify_argument(&setter_label, &new_value)?;

        let getter = self.attribute_getter(class, &key, &getter_label, &value, result_kind);
        let setter = self.attribute_setter(class, attr, &key, &setter_label, &new_value, arg_kind);
        Ok(BindCClassProperty {
            key,
            getter,
            setter: Some(setter),
            docstring: None,
        })
    }

    fn receiver(&mut self, scope: ScopeId, class: &ClassDef) -> MarshaledArgument {
        let receiver = FunctionArgument::new("self", class.class_type()).bound();
        self.marshal_argument(scope, &receiver, ArgumentKind::Handle, false)
    }

    fn attribute_getter(
        &mut self,
        class: &ClassDef,
        key: &MemberKey,
        label: &str,
        value: &FunctionResult,
        kind: ResultKind,
    ) -> BindCFunction {
        let root = self.scopes.root();
        let name = self.scopes.fresh_name(root, label);
        let scope = self.scopes.new_child(root, &name, ScopeKind::Function);

        let result = self.marshal_result(scope, value, kind, ResultSource::Dotted);
        let receiver = self.receiver(scope, class);

        let mut body: Vec<Stmt> = receiver.reinterpret.iter().cloned().collect();
        let attribute = Expr::attribute(receiver.bind.call_value.clone(), &key.member);
        body.push(if kind == ResultKind::Direct {
            Stmt::Assign {
                lhs: result.bind.local.var(),
                rhs: attribute,
            }
        } else {
            Stmt::AliasAssign {
                lhs: result.bind.local.var(),
                rhs: attribute,
            }
        });
        body.extend(result.deferred);

        BindCFunction {
            name,
            origin: Origin::Getter(key.clone()),
            arguments: vec![receiver.bind],
            results: vec![result.bind],
            body,
            locals: self.scopes.locals(scope),
            scope,
            docstring: None,
        }
    }

    fn attribute_setter(
        &mut self,
        class: &ClassDef,
        attr: &Attribute,
        key: &MemberKey,
        label: &str,
        new_value: &FunctionArgument,
        kind: ArgumentKind,
    ) -> BindCFunction {
        let root = self.scopes.root();
        let name = self.scopes.fresh_name(root, label);
        let scope = self.scopes.new_child(root, &name, ScopeKind::Function);

        let receiver = self.receiver(scope, class);
        let value = self.marshal_argument(scope, new_value, kind, false);

        let mut body: Vec<Stmt> = receiver
            .reinterpret
            .iter()
            .chain(value.reinterpret.iter())
            .cloned()
            .collect();
        let target = Expr::attribute(receiver.bind.call_value.clone(), &key.member);
        let rhs = value.bind.call_value.clone();
        body.push(if attr.is_alias {
            Stmt::AliasAssign { lhs: target, rhs }
        } else {
            Stmt::Assign { lhs: target, rhs }
        });

        BindCFunction {
            name,
            origin: Origin::Setter(key.clone()),
            arguments: vec![receiver.bind, value.bind],
            results: Vec::new(),
            body,
            locals: self.scopes.locals(scope),
            scope,
            docstring: None,
        }
    }
}
