pub use enclose::*;

#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut deps = $crate::Deps::new();
        $(deps.push($crate::Dep::from($dep));)*
        deps
    }};
}

#[macro_export]
macro_rules! memo {
    (( $($d_tt:tt)* ) $name:literal, $owner:ident => [ $($dep:expr),* $(,)? ] $($b:tt)*) => {
        $crate::Memo::new(
            $name,
            $crate::macros::enclose!(($( $d_tt )*) Box::new(move |$owner| $crate::deps![$($dep),*])),
            $crate::macros::enclose!(($( $d_tt )*) Box::new(move |$owner| { $($b)* })),
        )
    };
    ($name:literal, $owner:ident => [ $($dep:expr),* $(,)? ] $($b:tt)*) => {
        $crate::Memo::new(
            $name,
            Box::new(move |$owner| $crate::deps![$($dep),*]),
            Box::new(move |$owner| { $($b)* }),
        )
    };
}
