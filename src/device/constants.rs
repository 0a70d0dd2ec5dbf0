/**
 * The advertised local name of the peripheral.
 */
pub const DEFAULT_DEVICE_NAME: &str = "TappieV2";

/**
 * How often (milliseconds) to check if the peripheral is still connected.
 */
pub const POLL_DELAY: u64 = 500;

/**
 * How long (milliseconds) to wait between subscribing to two characteristics.
 * Some BLE stacks drop subscriptions that are requested back to back.
 */
pub const SUBSCRIBE_DELAY: u64 = 500;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take.
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) a single unsubscribe / disconnect may take during teardown.
 */
pub const TEARDOWN_DEADLINE: u64 = 2000;

/**
 * The UUID of the Bluetooth BLE service of the Tappie.
 */
pub const TAPPIE_SERVICE: u128 = 0x738b66f1_91b7_4f25_8ab8_31d38d56541a;

/**
 * Rotary encoder position, "<position> <battery>", "<position>" or "reset".
 */
pub const TAPPIE_ENCODER_POSITION_CHARACTERISTIC: u128 = 0xa9c8c7b4_fb55_4d27_99e4_2c14b5812546;

/**
 * Encoder button gestures, see the GESTURE_* constants.
 */
pub const TAPPIE_ENCODER_BUTTON_CHARACTERISTIC: u128 = 0x0c2f5fbe_c20f_49ec_8c7c_ce0c9358e574;

/**
 * Target name of the pressed button, "0" on release. Selects a target.
 */
pub const TAPPIE_SINGLE_BUTTON_CHARACTERISTIC: u128 = 0x9ff67916_665f_4489_b257_46d118b1e5eb;

/**
 * Target name of the pressed button, "0" on release. Toggles mute of a target.
 */
pub const TAPPIE_DOUBLE_BUTTON_CHARACTERISTIC: u128 = 0x66f1ab02_c93d_44fe_8ca9_5e8bdbb2fe80;

pub const FRAME_RESET: &str = "reset";
pub const FRAME_RELEASE: &str = "0";

pub const GESTURE_SINGLE_CLICK: &str = "single click";
pub const GESTURE_DOUBLE_CLICK: &str = "double click";
pub const GESTURE_MULTI_CLICK: &str = "multi click";
pub const GESTURE_LONG_PRESS_RELEASE: &str = "long press release";
