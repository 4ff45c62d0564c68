fn main() -> anyhow::Result<()> {
    beaconkit::platform::run()
}
