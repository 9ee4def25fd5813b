//! Macro that turns table declarations into `TableDef` constants.

/// Required-column flag from the optional `required` marker.
#[macro_export]
macro_rules! __is_required {
    ( required ) => {
        true
    };
    () => {
        false
    };
}

/// Declarative table definitions (spine + payload). Generates one `TableDef` constant per table
/// plus `ALL_TABLES`, parents first.
#[macro_export]
macro_rules! define_tables {
    (
        $(
            table $NAME:ident {
                kind: $kind:path,
                fields: {
                    $( $fname:ident : $fty:ident $( $req:ident )? ),* $(,)?
                },
                references: {
                    $( $rcol:ident -> $rkind:path ),* $(,)?
                },
                checks: [ $( $check:literal ),* $(,)? ] $(,)?
            }
        ),* $(,)?
    ) => {
        $(
            #[doc = concat!("Table definition for `", stringify!($NAME), "`.")]
            pub const $NAME: $crate::TableDef = $crate::TableDef {
                kind: $kind,
                columns: &[
                    $(
                        $crate::Column {
                            name: stringify!($fname),
                            ty: $crate::ColumnType::$fty,
                            required: $crate::__is_required!($($req)?),
                        },
                    )*
                ],
                foreign_keys: &[
                    $(
                        $crate::ForeignKey {
                            column: stringify!($rcol),
                            references: $rkind,
                        },
                    )*
                ],
                checks: &[ $( $check ),* ],
            };
        )*

        /// Every declared table, in declaration order.
        pub const ALL_TABLES: &[&$crate::TableDef] = &[ $( &$NAME ),* ];
    };
}
