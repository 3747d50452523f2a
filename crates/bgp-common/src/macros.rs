//! Shared macros for the byte-discriminated enums that recur throughout the
//! wire codec (`ORIGIN`, the message type octet, ...).

/// Declares a fieldless enum together with a `TryFrom<$repr>` decode and a
/// `From<$name> for $repr` encode, generated from one `variant = value`
/// table instead of writing the match twice by hand.
///
/// Grounded on the teacher's `type_enum!` - same "one table, both
/// directions" idea - generalized so each caller supplies its own error
/// type and its own "unrecognized byte" constructor, since this speaker
/// treats an unrecognized code as a hard decode error rather than the
/// teacher's lossless `Unknown(value)` passthrough variant.
#[macro_export]
macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ty => $error:ty, $unknown:expr, {
            $($variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant),+
        }

        impl ::std::convert::TryFrom<$repr> for $name {
            type Error = $error;

            fn try_from(value: $repr) -> ::std::result::Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(($unknown)(other)),
                }
            }
        }

        impl ::std::convert::From<$name> for $repr {
            fn from(value: $name) -> Self {
                match value {
                    $(<$name>::$variant => $value,)+
                }
            }
        }
    };
}
