use std::time::Duration;

use homwing_rs::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GripperError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // config file path, or the serial port path with defaults
    let arg = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let config = if arg.ends_with(".json") {
        GripperConfig::from_json_file(&arg)?
    } else {
        GripperConfig::new(arg)
    };
    let poll = config.poll_interval();

    let mut gripper = GripperDriver::connect(&config)?;

    // Diagnostics
    //
    println!("software version : {}", gripper.read_software_version().await?);
    println!("voltage/temperature : {:?}", gripper.read_voltage_temperature().await?);
    println!("fault/position : {:?}", gripper.read_fault_position().await?);

    // Reset and Activation of Gripper
    //
    // clearing the control register resets the gripper and its faults
    gripper.reset().await?;
    // activate the gripper, it will try to open and close.
    gripper
        .activate()
        .await?
        .wait_for_activation(poll, config.activation_timeout())
        .await?;
    println!("finished activation.");

    // Basic Gripper Command
    //
    // staging speed/force and position does not move the fingers
    gripper.set_speed_force(255, 20).await?.move_to_position(0).await?;
    gripper.execute_move().await?;
    let status = gripper.wait_for_move(poll, config.move_timeout()).await?;
    println!("Object Detect Status : {:?}", status.object);
    tokio::time::sleep(Duration::from_millis(1000)).await;

    // Chained command
    //
    let status = gripper
        .execute_control_movement(128, 50, 255)
        .await?
        .wait_for_move(poll, config.move_timeout())
        .await?;
    println!("Object Detect Status : {:?}, position {}", status.object, status.position);
    println!("speed/force : {:?}", gripper.read_speed_force().await?);
    tokio::time::sleep(Duration::from_millis(1000)).await;

    // Sweep
    //
    for position in (0..=255).step_by(51) {
        gripper.move_to_position(position).await?.execute_move().await?;
        match gripper.wait_for_move(poll, config.move_timeout()).await {
            Ok(status) => println!("{} -> {}", position, status.position),
            Err(GripperError::FaultDetected { faults, .. }) => {
                println!("fault at {}: {}", position, faults);
                gripper.stop().await?;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    gripper.stop().await?;
    Ok(())
}
