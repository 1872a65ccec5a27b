// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros shared by the flow crates.
//!
//! - [`simple_display!`] maps status enum variants to their wire names
//! - [`setters!`] generates chained setters for configuration structs
//! - [`builder!`] generates test builders for records with many fields

/// `Display` for a fieldless status enum, one string per variant.
///
/// ```ignore
/// crate::simple_display! {
///     NodeStatus {
///         Pending => "pending",
///         Running => "running",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let name = match self {
                    $( Self::$variant => $str, )+
                };
                f.write_str(name)
            }
        }
    };
}

/// Chained by-value setters, expanded inside an existing `impl` block.
///
/// `set` fields take the value as is; `option` fields are `Option<T>` and
/// the setter stores `Some`.
///
/// ```ignore
/// impl EngineConfig {
///     flow_core::setters! {
///         set { queue_capacity: usize }
///         option { finished_jobs_kept: usize }
///     }
/// }
/// ```
#[macro_export]
macro_rules! setters {
    (
        $(set { $( $field:ident : $ty:ty ),* $(,)? })?
        $(option { $( $opt:ident : $opt_ty:ty ),* $(,)? })?
    ) => {
        $($(
            pub fn $field(self, $field: $ty) -> Self {
                Self { $field, ..self }
            }
        )*)?
        $($(
            pub fn $opt(self, $opt: impl Into<$opt_ty>) -> Self {
                Self { $opt: Some($opt.into()), ..self }
            }
        )*)?
    };
}

/// Test builder for a record: a `<Target>Builder` with defaults, the
/// [`setters!`] of its fields, and `build()`. Also adds `Target::builder()`.
///
/// Everything it generates exists only under `test` or `test-support`.
/// `into` fields take `impl Into<T>`; `option` fields default to `None`.
///
/// ```ignore
/// crate::builder! {
///     pub struct NodeResultBuilder => NodeResult {
///         into { path: NodePath = "demo/step" }
///         set { status: NodeStatus = NodeStatus::Running }
///         option { exit_code: i32 }
///     }
/// }
/// ```
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            into { $( $into:ident : $into_ty:ty = $into_default:expr ),* $(,)? }
            set { $( $field:ident : $ty:ty = $default:expr ),* $(,)? }
            option { $( $opt:ident : $opt_ty:ty ),* $(,)? }
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        #[derive(Debug, Clone)]
        pub struct $builder {
            $( $into: $into_ty, )*
            $( $field: $ty, )*
            $( $opt: Option<$opt_ty>, )*
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $( $into: $into_default.into(), )*
                    $( $field: $default, )*
                    $( $opt: None, )*
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $(
                pub fn $into(self, $into: impl Into<$into_ty>) -> Self {
                    Self { $into: $into.into(), ..self }
                }
            )*

            $crate::setters! {
                set { $( $field: $ty ),* }
                option { $( $opt: $opt_ty ),* }
            }

            pub fn build(self) -> $target {
                $target {
                    $( $into: self.$into, )*
                    $( $field: self.$field, )*
                    $( $opt: self.$opt, )*
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            pub fn builder() -> $builder {
                $builder::default()
            }
        }
    };
}
