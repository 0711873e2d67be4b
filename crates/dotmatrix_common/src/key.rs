/// Host keys the frontends care about.
///
/// This is a deliberately small, backend-agnostic subset; each frontend maps
/// its own keycodes onto it and each machine maps it onto its input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Num1,
    Num2,
    Num3,
    Num4,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
    Up,
    Down,
    Left,
    Right,
    Return,
    Escape,
    None,
}
