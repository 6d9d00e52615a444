//! Guards: O(1) predicates deciding whether a cached target still applies.
//!
//! A guard only compares identities and type ids captured at resolution
//! time against the live receiver and arguments. It never searches a method
//! table and never mutates anything.
//!
//! | Variant          | Accepts when                                                   |
//! |------------------|----------------------------------------------------------------|
//! | `DispatchTable`  | receiver's class still has the captured table, same arg types  |
//! | `ExactTypes`     | receiver type and every argument type match exactly            |
//! | `SameClass`      | receiver is the captured class value, same arg types           |
//! | `Constructor`    | receiver is the captured class and argument types match        |
//! | `ByteSequence`   | receiver is a byte sequence (and the index is an int)          |
//! | `Operands`       | left and right operand types match exactly                     |

use dyncall_runtime::{Class, MethodTable, TypeId, Value};
use smallvec::SmallVec;
use std::sync::Arc;

/// Exact per-argument runtime types.
pub type TypeShape = SmallVec<[TypeId; 4]>;

/// Capture the runtime types of `args`.
#[inline]
pub fn shape_of(args: &[Value]) -> TypeShape {
    args.iter().map(Value::type_id).collect()
}

/// Compare live argument types against a captured shape.
#[inline(always)]
fn same_types(shape: &[TypeId], args: &[Value]) -> bool {
    shape.len() == args.len() && shape.iter().zip(args).all(|(t, a)| *t == a.type_id())
}

/// Cheap validity check for a cached resolution.
#[derive(Debug, Clone)]
pub enum Guard {
    /// Self-describing instance: identity of the class's dispatch table and
    /// exact argument types.
    DispatchTable {
        table: Arc<MethodTable>,
        arg_types: TypeShape,
    },
    /// Foreign instance: exact receiver type and exact argument types.
    ExactTypes {
        receiver: TypeId,
        arg_types: TypeShape,
    },
    /// Static call: the same class value and exact argument types.
    SameClass {
        class: Arc<Class>,
        arg_types: TypeShape,
    },
    /// Constructor call: the same class value and exact argument types.
    Constructor {
        class: Arc<Class>,
        arg_types: TypeShape,
    },
    /// Byte-sequence accessor; `index_arg` requires a single int argument.
    ByteSequence { index_arg: bool },
    /// Binary operator on two exact operand types.
    Operands { lhs: TypeId, rhs: TypeId },
}

impl Guard {
    /// Decide whether the cached target applies to this receiver and arguments.
    #[inline]
    pub fn accept(&self, receiver: &Value, args: &[Value]) -> bool {
        match self {
            Guard::DispatchTable { table, arg_types } => match receiver {
                Value::Object(instance) => {
                    instance.class().has_dispatch_table(table) && same_types(arg_types, args)
                }
                _ => false,
            },
            Guard::ExactTypes {
                receiver: expected,
                arg_types,
            } => receiver.type_id() == *expected && same_types(arg_types, args),
            Guard::SameClass { class, arg_types } => match receiver {
                Value::Class(live) => Arc::ptr_eq(live, class) && same_types(arg_types, args),
                _ => false,
            },
            Guard::Constructor { class, arg_types } => match receiver {
                Value::Class(live) => Arc::ptr_eq(live, class) && same_types(arg_types, args),
                _ => false,
            },
            Guard::ByteSequence { index_arg } => {
                matches!(receiver, Value::Bytes(_))
                    && if *index_arg {
                        matches!(args, [Value::Int(_)])
                    } else {
                        args.is_empty()
                    }
            }
            Guard::Operands { lhs, rhs } => match args {
                [arg] => receiver.type_id() == *lhs && arg.type_id() == *rhs,
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyncall_runtime::{Instance, Method};

    fn widget() -> Arc<Class> {
        Class::builder("Widget")
            .method(Method::new("size", [], |_, _| Ok(Value::Int(1))))
            .build(TypeId::from_raw(256))
    }

    fn object_of(class: &Arc<Class>) -> Value {
        Value::Object(Arc::new(Instance::new(Arc::clone(class))))
    }

    #[test]
    fn test_dispatch_table_identity() {
        let class = widget();
        let guard = Guard::DispatchTable {
            table: class.dispatch_table(),
            arg_types: TypeShape::new(),
        };
        let receiver = object_of(&class);
        assert!(guard.accept(&receiver, &[]));
        assert!(guard.accept(&object_of(&class), &[]));

        class.define_method(Method::new("size", [], |_, _| Ok(Value::Int(2))));
        assert!(!guard.accept(&receiver, &[]));
    }

    #[test]
    fn test_dispatch_table_rejects_other_classes() {
        let class = widget();
        let other = Class::builder("Gadget").build(TypeId::from_raw(257));
        let guard = Guard::DispatchTable {
            table: class.dispatch_table(),
            arg_types: TypeShape::new(),
        };
        assert!(!guard.accept(&object_of(&other), &[]));
        assert!(!guard.accept(&Value::bytes(&[1]), &[]));
    }

    #[test]
    fn test_dispatch_table_checks_arg_shape() {
        let class = widget();
        let guard = Guard::DispatchTable {
            table: class.dispatch_table(),
            arg_types: shape_of(&[Value::Int(0)]),
        };
        let receiver = object_of(&class);
        assert!(guard.accept(&receiver, &[Value::Int(5)]));
        assert!(!guard.accept(&receiver, &[Value::str("5")]));
        assert!(!guard.accept(&receiver, &[]));
        assert!(!guard.accept(&receiver, &[Value::Int(5), Value::Int(6)]));
    }

    #[test]
    fn test_exact_types_no_widening() {
        let guard = Guard::ExactTypes {
            receiver: TypeId::STR,
            arg_types: shape_of(&[Value::str("x")]),
        };
        assert!(guard.accept(&Value::str("abc"), &[Value::str("b")]));
        assert!(!guard.accept(&Value::str("abc"), &[Value::Int(1)]));
        assert!(!guard.accept(&Value::Int(1), &[Value::str("b")]));
        assert!(!guard.accept(&Value::str("abc"), &[]));
    }

    #[test]
    fn test_same_class_identity() {
        let class = widget();
        let lookalike = widget();
        let guard = Guard::SameClass {
            class: Arc::clone(&class),
            arg_types: TypeShape::new(),
        };
        assert!(guard.accept(&Value::Class(Arc::clone(&class)), &[]));
        assert!(!guard.accept(&Value::Class(Arc::clone(&class)), &[Value::Int(1)]));
        assert!(!guard.accept(&Value::Class(lookalike), &[]));
        assert!(!guard.accept(&object_of(&class), &[]));
    }

    #[test]
    fn test_constructor_shape() {
        let class = widget();
        let guard = Guard::Constructor {
            class: Arc::clone(&class),
            arg_types: shape_of(&[Value::Int(0), Value::str("")]),
        };
        let receiver = Value::Class(class);
        assert!(guard.accept(&receiver, &[Value::Int(3), Value::str("w")]));
        assert!(!guard.accept(&receiver, &[Value::Int(3)]));
        assert!(!guard.accept(&receiver, &[Value::Float(3.0), Value::str("w")]));
    }

    #[test]
    fn test_byte_sequence() {
        let length = Guard::ByteSequence { index_arg: false };
        let index = Guard::ByteSequence { index_arg: true };
        let bytes = Value::bytes(&[1, 2, 3]);

        assert!(length.accept(&bytes, &[]));
        assert!(!length.accept(&Value::str("abc"), &[]));
        assert!(index.accept(&bytes, &[Value::Int(-1)]));
        assert!(!index.accept(&bytes, &[Value::Float(0.0)]));
        assert!(!index.accept(&bytes, &[]));
    }

    #[test]
    fn test_operands() {
        let guard = Guard::Operands {
            lhs: TypeId::INT,
            rhs: TypeId::FLOAT,
        };
        assert!(guard.accept(&Value::Int(1), &[Value::Float(2.0)]));
        assert!(!guard.accept(&Value::Int(1), &[Value::Int(2)]));
        assert!(!guard.accept(&Value::Int(1), &[]));
    }
}
