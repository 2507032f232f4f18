/// Control actions supported by the step driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop driving and return the solution so far.
    StopEarly,
}
