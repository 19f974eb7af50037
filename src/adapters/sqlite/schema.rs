//! Idempotent schema, applied on every connect.

pub const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS properties (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        slug TEXT NOT NULL,
        name TEXT NOT NULL,
        base_price INTEGER NOT NULL CHECK (base_price >= 0),
        currency TEXT NOT NULL,
        cleaning_fee INTEGER NOT NULL DEFAULT 0 CHECK (cleaning_fee >= 0),
        min_nights INTEGER NOT NULL DEFAULT 1,
        max_nights INTEGER,
        max_guests INTEGER NOT NULL,
        external_listing_id TEXT UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS guests (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        phone TEXT,
        UNIQUE (organization_id, email)
    )",
    "CREATE TABLE IF NOT EXISTS reservations (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        property_id TEXT NOT NULL REFERENCES properties(id),
        guest_id TEXT NOT NULL REFERENCES guests(id),
        status TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'cancelled')),
        check_in TEXT NOT NULL,
        check_out TEXT NOT NULL,
        adults INTEGER NOT NULL,
        children INTEGER NOT NULL DEFAULT 0,
        infants INTEGER NOT NULL DEFAULT 0,
        accommodation INTEGER NOT NULL,
        cleaning INTEGER NOT NULL,
        service INTEGER NOT NULL,
        taxes INTEGER NOT NULL,
        total INTEGER NOT NULL,
        currency TEXT NOT NULL,
        payment_status TEXT NOT NULL,
        source TEXT NOT NULL,
        external_id TEXT UNIQUE,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        cancelled_at TEXT,
        CHECK (check_in < check_out)
    )",
    "CREATE INDEX IF NOT EXISTS idx_reservations_property_dates
        ON reservations (property_id, check_in, check_out)",
    "CREATE TABLE IF NOT EXISTS calendar_days (
        property_id TEXT NOT NULL REFERENCES properties(id),
        date TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('available', 'booked', 'blocked')),
        reservation_id TEXT REFERENCES reservations(id),
        price INTEGER,
        min_nights INTEGER,
        block_reason TEXT,
        PRIMARY KEY (property_id, date),
        CHECK (status <> 'booked' OR reservation_id IS NOT NULL)
    )",
    "CREATE INDEX IF NOT EXISTS idx_calendar_days_reservation
        ON calendar_days (reservation_id)",
    "CREATE TABLE IF NOT EXISTS quotes (
        id TEXT PRIMARY KEY,
        property_id TEXT NOT NULL,
        check_in TEXT NOT NULL,
        check_out TEXT NOT NULL,
        adults INTEGER NOT NULL,
        children INTEGER NOT NULL,
        infants INTEGER NOT NULL,
        promo_code TEXT,
        currency TEXT NOT NULL,
        total INTEGER NOT NULL,
        breakdown TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS event_log (
        id TEXT PRIMARY KEY,
        event_id TEXT,
        kind TEXT NOT NULL,
        organization_id TEXT,
        external_id TEXT,
        aggregate_id TEXT,
        outcome TEXT NOT NULL,
        detail TEXT NOT NULL,
        latency_ms INTEGER NOT NULL,
        received_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_event_log_received ON event_log (received_at)",
];
