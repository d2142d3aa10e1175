// Scoped logging on top of `tracing`. Each scope can be given its own level
// through the runtime's log environment variable, e.g.
// `WAYFINDER_LOG=warn,locomotion=debug,session=info`.

#[macro_export]
macro_rules! scoped_log {
    (@emit $level:ident, $mac:ident, $scope:expr, $($arg:tt)*) => {{
        if $crate::logging::get_log_config().should_log($scope, $crate::logging::Level::$level) {
            $crate::logging::tracing::$mac!(scope = $scope, $($arg)*);
        }
    }};
    (error, $scope:expr, $($arg:tt)*) => { $crate::scoped_log!(@emit ERROR, error, $scope, $($arg)*) };
    (warn, $scope:expr, $($arg:tt)*) => { $crate::scoped_log!(@emit WARN, warn, $scope, $($arg)*) };
    (info, $scope:expr, $($arg:tt)*) => { $crate::scoped_log!(@emit INFO, info, $scope, $($arg)*) };
    (debug, $scope:expr, $($arg:tt)*) => { $crate::scoped_log!(@emit DEBUG, debug, $scope, $($arg)*) };
    (trace, $scope:expr, $($arg:tt)*) => { $crate::scoped_log!(@emit TRACE, trace, $scope, $($arg)*) };
}

#[macro_export]
macro_rules! locomotion_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::scoped_log!($level, "locomotion", $($arg)*)
    };
}

#[macro_export]
macro_rules! teleport_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::scoped_log!($level, "teleport", $($arg)*)
    };
}

#[macro_export]
macro_rules! comfort_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::scoped_log!($level, "comfort", $($arg)*)
    };
}

#[macro_export]
macro_rules! session_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::scoped_log!($level, "session", $($arg)*)
    };
}

#[macro_export]
macro_rules! input_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::scoped_log!($level, "input", $($arg)*)
    };
}
